pub mod engagement;
pub mod ingest;
