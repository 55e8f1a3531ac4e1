use snafu::Snafu;

/// Errors returned by `ProgressStore`/`CatalogStore` implementations.
#[derive(Snafu, Debug)]
pub enum StoreError {
    /// A conditional write did not apply because its precondition
    /// ("a record for this key exists") no longer held.
    #[snafu(display("conditional update precondition failed"))]
    PreconditionFailed,
    /// Transient backend failure (timeout, throttling, connection loss).
    #[snafu(display("storage backend failure: {message}"))]
    Backend { message: String },
}

#[derive(Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum SchedulerError {
    /// Malformed input, rejected before any storage call.
    #[snafu(display("invalid request: {message}"))]
    Validation { message: String },
    /// The referenced catalog item does not exist, or the progress record
    /// vanished mid-operation with no recovery possible.
    #[snafu(display("item not found: {item_id}"))]
    NotFound { item_id: String },
    /// A conditional update lost a race even after one recovery attempt.
    /// The whole operation is safe to retry.
    #[snafu(display("concurrent update conflict on item: {item_id}"))]
    Conflict { item_id: String },
    #[snafu(display("storage failure: {source}"))]
    Storage { source: StoreError },
}

pub type Result<T, E = SchedulerError> = std::result::Result<T, E>;
