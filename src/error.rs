/// Errors that can occur during wikitext serialization.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SerializeError {
    #[error("document has no <body> element")]
    MissingBody,
    #[error("serialization failed at <{node}>: {reason}")]
    Handler { node: String, reason: String },
    #[error("original page source required for selective serialization")]
    MissingPageSource,
}
