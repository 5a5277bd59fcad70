#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("degenerate quadrilateral: {0}")]
    DegenerateQuad(String),

    #[error("invalid corner specification: {0}")]
    InvalidCorners(String),

    #[error("empty input image")]
    EmptyImage,
}
