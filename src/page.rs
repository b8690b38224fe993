//! Page loading for the CLI: http(s) URLs are fetched, anything else that
//! is not a URL is read from disk.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info};
use url::Url;

/// A document and the URL it is shown at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoadedPage {
    pub url: String,
    pub markup: String,
}

pub(crate) async fn load_page(page: &str, http: &reqwest::Client) -> Result<LoadedPage> {
    match Url::parse(page) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => fetch(url, http).await,
        Ok(url) if url.scheme() == "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| anyhow!("not a local file url: {page}"))?;
            read_file(&path).await
        }
        // Other schemes are passed through so the controller can refuse them.
        // Single letters are Windows drive prefixes.
        Ok(url) if url.scheme().len() > 1 => Ok(LoadedPage {
            url: page.to_string(),
            markup: String::new(),
        }),
        _ => read_file(Path::new(page)).await,
    }
}

async fn fetch(url: Url, http: &reqwest::Client) -> Result<LoadedPage> {
    info!(%url, "Fetching page");
    let response = http
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("failed to fetch {url}"))?
        .error_for_status()
        .with_context(|| format!("failed to fetch {url}"))?;
    let final_url = response.url().to_string();
    let markup = response
        .text()
        .await
        .with_context(|| format!("failed to read body of {url}"))?;
    debug!(url = %final_url, bytes = markup.len(), "Fetched page");
    Ok(LoadedPage {
        url: final_url,
        markup,
    })
}

async fn read_file(path: &Path) -> Result<LoadedPage> {
    let path = tokio::fs::canonicalize(path)
        .await
        .with_context(|| format!("page not found: {}", path.display()))?;
    let markup = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let url = Url::from_file_path(&path)
        .map_err(|_| anyhow!("cannot express {} as a file url", path.display()))?;
    Ok(LoadedPage {
        url: url.to_string(),
        markup,
    })
}

/// Write the document to `output`, or stdout.
pub(crate) async fn write_document(markup: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            tokio::fs::write(path, markup)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "Wrote document");
        }
        None => println!("{markup}"),
    }
    Ok(())
}
