use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("store error: {0}")]
    Store(#[from] ecograph_store::StoreError),

    #[error("xmi error: {0}")]
    Xmi(#[from] ecograph_xmi::XmiError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no EPackage found in {0}")]
    NoPackages(String),
}

pub type SdkResult<T> = Result<T, SdkError>;
