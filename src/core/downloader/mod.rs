mod client;

pub use client::{Checksum, DownloadEntry, Downloader};
