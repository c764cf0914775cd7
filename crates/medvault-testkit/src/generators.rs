//! Proptest generators for property-based testing.

use proptest::prelude::*;

use medvault_core::{
    AccessRequest, AccessStatus, BlobLocator, Conditions, Principal, Record, RecordId, RequestId,
    VACCINE_CATALOG,
};
use medvault_perms::AccessDuration;

/// Generate a wallet-style address.
pub fn address() -> impl Strategy<Value = String> {
    "0x[0-9a-f]{40}".prop_map(String::from)
}

/// Generate a principal.
pub fn principal() -> impl Strategy<Value = Principal> {
    address().prop_filter_map("valid principal", |a| Principal::new(a).ok())
}

/// Generate a random RecordId.
pub fn record_id() -> impl Strategy<Value = RecordId> {
    any::<[u8; 16]>().prop_map(RecordId::from_bytes)
}

/// Generate a random RequestId.
pub fn request_id() -> impl Strategy<Value = RequestId> {
    any::<[u8; 16]>().prop_map(RequestId::from_bytes)
}

/// Generate a reasonable timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=1_900_000_000_000i64
}

/// Generate an AccessStatus.
pub fn access_status() -> impl Strategy<Value = AccessStatus> {
    prop::sample::select(AccessStatus::ALL.to_vec())
}

/// Generate an AccessDuration.
pub fn access_duration() -> impl Strategy<Value = AccessDuration> {
    prop::sample::select(AccessDuration::ALL.to_vec())
}

/// Generate a file-like record name.
pub fn record_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,15}\\.(pdf|png|jpg|docx)".prop_map(String::from)
}

/// Generate a catalog vaccine name.
pub fn vaccine_name() -> impl Strategy<Value = &'static str> {
    prop::sample::select(VACCINE_CATALOG.to_vec())
}

/// Parameters for generating a record.
#[derive(Debug, Clone)]
pub struct RecordParams {
    pub id: RecordId,
    pub name: String,
    pub description: String,
    pub owner: Principal,
    pub upload_date: i64,
}

impl Arbitrary for RecordParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            record_id(),
            record_name(),
            "[ -~]{0,40}", // description
            principal(),
            timestamp(),
        )
            .prop_map(|(id, name, description, owner, upload_date)| RecordParams {
                id,
                name,
                description,
                owner,
                upload_date,
            })
            .boxed()
    }
}

/// Generate a record from parameters.
pub fn record_from_params(params: &RecordParams) -> Record {
    Record {
        id: params.id,
        name: params.name.clone(),
        description: params.description.clone(),
        upload_date: params.upload_date,
        file_url: BlobLocator::new(format!("blake3:{}", params.id.to_hex())),
        owner: params.owner.clone(),
    }
}

/// Generate an access request for `record_id` in any status.
pub fn access_request(record_id: RecordId) -> impl Strategy<Value = AccessRequest> {
    (
        request_id(),
        principal(),
        access_status(),
        timestamp(),
        prop::option::of(timestamp()),
    )
        .prop_map(move |(id, address, status, created_at, expires_at)| {
            let conditions =
                (status == AccessStatus::Granted).then_some(Conditions { expires_at });
            AccessRequest {
                id,
                address,
                record_id,
                status,
                created_at,
                updated_at: created_at,
                conditions,
            }
        })
}
