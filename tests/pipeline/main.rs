mod concurrency;
mod idempotence;
mod overrides;
mod preconditions;
mod resumability;
mod scenario;
mod support;
