//! Parsing of the release index and selection of the archive to install.

use serde_derive::Deserialize;
use std::future::Future;
use url::Url;

use crate::{
    errors::{ErrorKind, UpdaterError},
    platform::{resolve_platform_suffix, PlatformSuffix},
};

const ARCHIVE_EXTENSION: &str = ".tar.gz";
const ARCHIVE_CONTENT_TYPE: &str = "application/gzip";

/// Where release metadata and archives come from.
pub trait ReleaseSource {
    /// Fetch the JSON document describing the latest release.
    fn fetch_index(&self) -> impl Future<Output = Result<String, UpdaterError>>;

    /// Download the bytes behind an asset URL.
    fn download(&self, url: &Url) -> impl Future<Output = Result<Vec<u8>, UpdaterError>>;
}

/// Release source backed by the GitHub releases API.
pub struct HttpReleaseSource {
    client: reqwest::Client,
    index_url: String,
}

impl HttpReleaseSource {
    pub fn new<U: Into<String>>(index_url: U) -> Result<Self, UpdaterError> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;
        Ok(Self {
            client,
            index_url: index_url.into(),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, UpdaterError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| UpdaterError::from_source(ErrorKind::DownloadFailed, url, err))?;

        if !response.status().is_success() {
            return Err(UpdaterError::new(
                ErrorKind::DownloadFailed,
                format!("{} returned {}", url, response.status()),
            ));
        }
        Ok(response)
    }
}

impl ReleaseSource for HttpReleaseSource {
    async fn fetch_index(&self) -> Result<String, UpdaterError> {
        Ok(self.get(&self.index_url).await?.text().await?)
    }

    async fn download(&self, url: &Url) -> Result<Vec<u8>, UpdaterError> {
        Ok(self.get(url.as_str()).await?.bytes().await?.to_vec())
    }
}

#[derive(Deserialize)]
struct RawReleaseIndex {
    assets: Vec<RawAsset>,
}

#[derive(Deserialize)]
struct RawAsset {
    name: String,
    browser_download_url: String,
    content_type: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReleaseAsset {
    pub name: String,
    pub download_url: Url,
    pub content_type: String,
}

impl ReleaseAsset {
    fn is_archive_for(&self, suffix: &PlatformSuffix) -> bool {
        self.name.contains(suffix.as_str())
            && self.name.ends_with(ARCHIVE_EXTENSION)
            && self.content_type == ARCHIVE_CONTENT_TYPE
    }
}

/// The assets of one release, in the order the index lists them.
#[derive(Clone, Debug, PartialEq)]
pub struct ReleaseIndex {
    pub assets: Vec<ReleaseAsset>,
}

impl ReleaseIndex {
    /// Parse and validate an index document. Every asset needs a non-empty
    /// name, an absolute download URL and a content type.
    pub fn parse(document: &str) -> Result<Self, UpdaterError> {
        let raw: RawReleaseIndex = serde_json::from_str(document)?;
        let assets = raw
            .assets
            .into_iter()
            .enumerate()
            .map(|(position, asset)| {
                if asset.name.trim().is_empty() {
                    return Err(UpdaterError::new(
                        ErrorKind::InvalidReleaseDocument,
                        format!("asset #{} has an empty name", position),
                    ));
                }
                let download_url = Url::parse(&asset.browser_download_url).map_err(|err| {
                    UpdaterError::from_source(
                        ErrorKind::InvalidReleaseDocument,
                        format!("asset {:?} has a bad download URL", asset.name),
                        err,
                    )
                })?;
                Ok(ReleaseAsset {
                    name: asset.name,
                    download_url,
                    content_type: asset.content_type,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { assets })
    }

    /// All gzip tarballs built for `suffix`, in index order.
    pub fn candidates(&self, suffix: &PlatformSuffix) -> Vec<&ReleaseAsset> {
        self.assets
            .iter()
            .filter(|asset| asset.is_archive_for(suffix))
            .collect()
    }

    /// Pick the archive for `suffix`. When the index lists several, the
    /// first one wins.
    pub fn select(&self, suffix: &PlatformSuffix) -> Result<&ReleaseAsset, UpdaterError> {
        self.assets
            .iter()
            .find(|asset| asset.is_archive_for(suffix))
            .ok_or_else(|| {
                let available: Vec<&str> = self
                    .assets
                    .iter()
                    .filter(|asset| asset.name.ends_with(ARCHIVE_EXTENSION))
                    .map(|asset| asset.name.as_str())
                    .collect();
                UpdaterError::new(
                    ErrorKind::NoMatchingAsset,
                    format!(
                        "no {} archive for {}; available archives: [{}]",
                        ARCHIVE_CONTENT_TYPE,
                        suffix,
                        available.join(", ")
                    ),
                )
            })
    }
}

/// Find the download URL of the archive for `platform_suffix`, or for the
/// running host when no suffix is given.
///
/// Logs a warning when more than one archive matches.
pub fn resolve_tar_gz_url(
    release_index_json: &str,
    platform_suffix: Option<&PlatformSuffix>,
    log: &slog::Logger,
) -> Result<Url, UpdaterError> {
    let index = ReleaseIndex::parse(release_index_json)?;
    let suffix = match platform_suffix {
        Some(suffix) => suffix.clone(),
        None => resolve_platform_suffix()?,
    };

    let candidates = index.candidates(&suffix);
    if candidates.len() > 1 {
        let names: Vec<&str> = candidates.iter().map(|asset| asset.name.as_str()).collect();
        slog::warn!(log, "Several release archives match, using the first";
                    "platform" => suffix.as_str(), "matches" => names.join(", "));
    }

    let asset = index.select(&suffix)?;
    slog::info!(log, "Resolved release archive";
                "platform" => suffix.as_str(), "asset" => &asset.name);
    Ok(asset.download_url.clone())
}
