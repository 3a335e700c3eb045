pub mod keywords;
pub mod subscription;
pub mod watermark;
