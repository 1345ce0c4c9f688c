use std::{fmt, str::FromStr};

use {serde_json::json, tracing::{debug, warn}};

use crate::{
    Error, Result,
    client::{ApiClient, ApiRequest, ApiResponse},
};

/// Collections under `/me` that accept `PUT {"ids": [...]}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LibraryResource {
    Albums,
    Tracks,
    Episodes,
    Shows,
    Audiobooks,
}

impl LibraryResource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Albums => "albums",
            Self::Tracks => "tracks",
            Self::Episodes => "episodes",
            Self::Shows => "shows",
            Self::Audiobooks => "audiobooks",
        }
    }

    pub fn path(self) -> String {
        format!("/me/{}", self.as_str())
    }
}

impl fmt::Display for LibraryResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LibraryResource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "albums" | "album" => Ok(Self::Albums),
            "tracks" | "track" => Ok(Self::Tracks),
            "episodes" | "episode" => Ok(Self::Episodes),
            "shows" | "show" => Ok(Self::Shows),
            "audiobooks" | "audiobook" => Ok(Self::Audiobooks),
            other => Err(Error::message(format!("unknown library resource '{other}'"))),
        }
    }
}

impl ApiClient {
    /// Save `ids` to the user's library, one request per chunk of
    /// [`ApiClient::batch_size`] ids, in order.
    ///
    /// Returns one entry per chunk. A failed chunk never stops the ones after it.
    pub async fn save_batch<S: AsRef<str>>(
        &self,
        resource: LibraryResource,
        ids: &[S],
    ) -> Vec<Result<ApiResponse>> {
        let path = resource.path();
        let chunks = ids.chunks(self.batch_size());
        let total = chunks.len();
        let mut results = Vec::with_capacity(total);

        for (index, chunk) in chunks.enumerate() {
            let ids: Vec<&str> = chunk.iter().map(AsRef::as_ref).collect();
            debug!(
                resource = %resource,
                chunk = index + 1,
                total,
                size = ids.len(),
                "saving chunk"
            );

            let req = ApiRequest::put(path.as_str()).json(json!({ "ids": ids }));
            let result = self.request(&req).await;
            match &result {
                Ok(resp) if !resp.is_success() => {
                    warn!(
                        resource = %resource,
                        chunk = index + 1,
                        status = resp.status.as_u16(),
                        "chunk rejected"
                    );
                },
                Err(e) => {
                    warn!(resource = %resource, chunk = index + 1, error = %e, "chunk failed");
                },
                Ok(_) => {},
            }
            results.push(result);
        }
        results
    }
}
