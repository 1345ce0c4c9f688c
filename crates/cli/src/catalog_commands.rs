use std::path::PathBuf;

use {
    anyhow::{Context, Result, bail},
    clap::Args,
    digger_catalog::{ApiClient, LibraryResource, SearchQuery, SearchResponse, SearchType},
    digger_config::DiggerConfig,
    tracing::info,
};

use crate::auth_commands::obtain_token;

#[derive(Args)]
pub struct SearchArgs {
    /// Item kind: album, artist or track.
    #[arg(long = "type", short = 't', default_value = "album", value_parser = parse_search_type)]
    kind: SearchType,
    /// Free-text query, passed through verbatim.
    query: Option<String>,
    /// Field filter such as `artist=Low`; repeatable, joined in order.
    #[arg(long = "field", short = 'f', value_parser = parse_field)]
    fields: Vec<(String, String)>,
    /// Print the raw JSON response.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
pub struct SaveArgs {
    /// Library collection: albums, tracks, episodes, shows or audiobooks.
    #[arg(long, short = 'r', default_value = "albums", value_parser = parse_resource)]
    resource: LibraryResource,
    /// Item ids to save.
    ids: Vec<String>,
    /// Read additional ids from a file, one per line.
    #[arg(long)]
    file: Option<PathBuf>,
}

fn parse_search_type(s: &str) -> std::result::Result<SearchType, String> {
    s.parse().map_err(|e: digger_catalog::Error| e.to_string())
}

fn parse_resource(s: &str) -> std::result::Result<LibraryResource, String> {
    s.parse().map_err(|e: digger_catalog::Error| e.to_string())
}

fn parse_field(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("expected FIELD=VALUE, got '{s}'")),
    }
}

fn build_query(query: Option<String>, fields: Vec<(String, String)>) -> Result<SearchQuery> {
    match (query, fields.is_empty()) {
        (Some(q), true) => Ok(SearchQuery::Raw(q)),
        (None, false) => Ok(SearchQuery::Fields(fields)),
        (Some(q), false) => {
            // Free text goes first, field filters follow.
            let mut raw = q;
            for (k, v) in fields {
                raw.push(' ');
                raw.push_str(&format!("{k}:{v}"));
            }
            Ok(SearchQuery::Raw(raw))
        },
        (None, true) => bail!("give a query or at least one --field"),
    }
}

/// Parse ids from a file: one per line, blanks and `#` comments skipped.
fn read_ids(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

async fn api_client(config: &DiggerConfig) -> Result<ApiClient> {
    let bundle = obtain_token(config).await?;
    Ok(ApiClient::from_config(&config.api, bundle.access_token.clone()))
}

pub async fn search(config: &DiggerConfig, args: SearchArgs) -> Result<()> {
    let query = build_query(args.query, args.fields)?;
    let client = api_client(config).await?;

    let resp = client.search(args.kind, &query).await?;
    if !resp.is_success() {
        bail!("search failed with {}: {}", resp.status, resp.text());
    }
    if args.json {
        println!("{}", resp.text());
        return Ok(());
    }

    let results: SearchResponse = resp.json()?;
    let lines = results.summary_lines();
    if lines.is_empty() {
        println!("No results.");
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

pub async fn save(config: &DiggerConfig, args: SaveArgs) -> Result<()> {
    let mut ids = args.ids;
    if let Some(path) = &args.file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read ids from {}", path.display()))?;
        ids.extend(read_ids(&text));
    }
    if ids.is_empty() {
        bail!("no ids given");
    }

    let client = api_client(config).await?;
    let batch = client.batch_size();
    let results = client.save_batch(args.resource, &ids).await;

    let mut failed = 0usize;
    for (index, result) in results.iter().enumerate() {
        let start = index * batch;
        let end = (start + batch).min(ids.len());
        match result {
            Ok(resp) if resp.is_success() => {},
            Ok(resp) => {
                failed += 1;
                eprintln!("ids {}..{} rejected: {} {}", start + 1, end, resp.status, resp.text());
            },
            Err(e) => {
                failed += 1;
                eprintln!("ids {}..{} failed: {e}", start + 1, end);
            },
        }
    }

    info!(
        resource = %args.resource,
        ids = ids.len(),
        chunks = results.len(),
        failed,
        "save finished"
    );
    if failed > 0 {
        bail!("{failed} of {} batches failed", results.len());
    }
    println!("Saved {} {} to your library.", ids.len(), args.resource);
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_parsing() {
        assert_eq!(
            parse_field("artist=Songs: Ohia").unwrap(),
            ("artist".to_string(), "Songs: Ohia".to_string())
        );
        assert!(parse_field("artist").is_err());
        assert!(parse_field("=x").is_err());
    }

    #[test]
    fn query_building() {
        assert_eq!(
            build_query(Some("Low".into()), Vec::new()).unwrap(),
            SearchQuery::Raw("Low".into())
        );
        assert_eq!(
            build_query(None, vec![("album".into(), "Josephine".into())])
                .unwrap()
                .to_query_string(),
            "album:Josephine"
        );
        assert_eq!(
            build_query(Some("live".into()), vec![("artist".into(), "Low".into())])
                .unwrap()
                .to_query_string(),
            "live artist:Low"
        );
        assert!(build_query(None, Vec::new()).is_err());
    }

    #[test]
    fn id_file_skips_blanks_and_comments() {
        let ids = read_ids("# saved from export\n4Alb\n\n  5Alb  \n#6Alb\n");
        assert_eq!(ids, vec!["4Alb", "5Alb"]);
    }
}
