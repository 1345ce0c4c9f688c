use std::{fmt, str::FromStr};

use crate::{
    Error, Result,
    client::{ApiClient, ApiRequest, ApiResponse},
};

/// Item kind searched for, sent as the `type` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchType {
    Album,
    Artist,
    Track,
}

impl SearchType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Album => "album",
            Self::Artist => "artist",
            Self::Track => "track",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "album" | "albums" => Ok(Self::Album),
            "artist" | "artists" => Ok(Self::Artist),
            "track" | "tracks" => Ok(Self::Track),
            other => Err(Error::message(format!(
                "unknown search type '{other}' (expected album, artist or track)"
            ))),
        }
    }
}

/// The `q` parameter, either verbatim or built from field filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    Raw(String),
    /// `field:value` pairs, joined with spaces in insertion order.
    Fields(Vec<(String, String)>),
}

impl SearchQuery {
    pub fn fields<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::Fields(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn to_query_string(&self) -> String {
        match self {
            Self::Raw(q) => q.clone(),
            Self::Fields(pairs) => pairs
                .iter()
                .map(|(field, value)| format!("{field}:{value}"))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl From<&str> for SearchQuery {
    fn from(q: &str) -> Self {
        Self::Raw(q.to_string())
    }
}

impl ApiClient {
    /// `GET /search` for `kind`, scoped to the configured market.
    pub async fn search(&self, kind: SearchType, query: &SearchQuery) -> Result<ApiResponse> {
        let req = ApiRequest::get("/search")
            .query("q", query.to_query_string())
            .query("type", kind.as_str())
            .query("market", self.market());
        self.request(&req).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::Secret};

    #[test]
    fn fields_join_in_insertion_order() {
        let q = SearchQuery::fields([("artist", "Magnolia Electric Co"), ("album", "Josephine")]);
        assert_eq!(
            q.to_query_string(),
            "artist:Magnolia Electric Co album:Josephine"
        );
    }

    #[test]
    fn raw_passes_through() {
        let q = SearchQuery::from("Magnolia Electric Co");
        assert_eq!(q.to_query_string(), "Magnolia Electric Co");
    }

    #[test]
    fn empty_fields_yield_empty_query() {
        assert_eq!(SearchQuery::Fields(Vec::new()).to_query_string(), "");
    }

    #[test]
    fn search_type_parses_singular_and_plural() {
        assert_eq!("Album".parse::<SearchType>().unwrap(), SearchType::Album);
        assert_eq!("tracks".parse::<SearchType>().unwrap(), SearchType::Track);
        assert!("playlist".parse::<SearchType>().is_err());
        assert_eq!(SearchType::Artist.to_string(), "artist");
    }

    #[tokio::test]
    async fn search_sends_q_type_and_market() {
        use mockito::Matcher;

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "artist:Low album:Things We Lost".into()),
                Matcher::UrlEncoded("type".into(), "album".into()),
                Matcher::UrlEncoded("market".into(), "from_token".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"albums":{"items":[],"total":0,"limit":20,"offset":0}}"#)
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), Secret::new("t".into()));
        let query = SearchQuery::fields([("artist", "Low"), ("album", "Things We Lost")]);
        let resp = client.search(SearchType::Album, &query).await.unwrap();
        assert!(resp.is_success());
        mock.assert_async().await;
    }
}
