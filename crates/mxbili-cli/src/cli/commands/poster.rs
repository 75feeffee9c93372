//! `mxbili poster <id>` – resolve a cover image.

use anyhow::Result;
use mxbili_core::config::MxbiliConfig;
use mxbili_core::poster::PosterResolver;

pub async fn run_poster(cfg: &MxbiliConfig, id: &str, port: Option<u16>) -> Result<()> {
    let resolver = PosterResolver::new(cfg)?;
    let poster = resolver.resolve_str(id).await?;
    println!("{} ({})", poster.title, poster.video);
    println!("direct:  {}", poster.url);
    println!("proxied: {}", poster.proxied_url(port.unwrap_or(cfg.port)));
    Ok(())
}
