/// Errors from parsing or serialising XMI.
///
/// Unresolvable references are not errors: they are dropped from the graph.
#[derive(Debug, thiserror::Error)]
pub enum XmiError {
    /// A schema element lacks an attribute it cannot be built without.
    #[error("<{element}> is missing required attribute `{attribute}`")]
    MissingAttribute { element: String, attribute: String },

    /// The document declares an XMI version older than 2.0.
    #[error("unsupported XMI version {0}")]
    UnsupportedVersion(String),

    /// The bytes are not UTF-8 text.
    #[error("document is not valid UTF-8: {0}")]
    Encoding(String),

    /// The document has no root element.
    #[error("document has no root element")]
    MissingRoot,

    /// The XML itself is malformed.
    #[error("malformed XML: {0}")]
    Xml(String),
}

pub type XmiResult<T> = Result<T, XmiError>;
