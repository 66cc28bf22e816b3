//! Identifier Issuer
//!
//! Rejection sampling over a bounded id space: draw uniformly, skip ids the
//! remote registry lists, and hand out the first id the local registry
//! accepts. The local record happens before the id is returned, so an id is
//! never issued twice even if the caller crashes before using it.

use crate::{IssueError, LocalRegistry, RemoteRegistry, TokenId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use resilience::{retry, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Inclusive range of issuable identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdSpace {
    pub min: TokenId,
    pub max: TokenId,
}

impl IdSpace {
    /// Create a space, rejecting `min > max`
    pub fn new(min: TokenId, max: TokenId) -> Result<Self, String> {
        if min > max {
            return Err(format!("id space min ({}) exceeds max ({})", min, max));
        }
        Ok(Self { min, max })
    }

    /// Number of identifiers in the space
    pub fn size(&self) -> u128 {
        u128::from(self.max - self.min) + 1
    }

    /// Whether `id` lies in the space
    pub fn contains(&self, id: TokenId) -> bool {
        id >= self.min && id <= self.max
    }

    /// Draw a uniformly distributed identifier
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> TokenId {
        rng.gen_range(self.min..=self.max)
    }
}

/// Issuer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    /// Smallest issuable id
    pub id_min: TokenId,
    /// Largest issuable id
    pub id_max: TokenId,
    /// Rejected draws tolerated per issuance before giving up
    pub max_draws: u64,
    /// SQLite registry path; in-memory when unset
    pub registry_path: Option<String>,
    /// RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            id_min: 1,
            id_max: i64::MAX as TokenId,
            max_draws: 64,
            registry_path: None,
            seed: None,
        }
    }
}

impl IssuerConfig {
    /// The configured id space
    pub fn id_space(&self) -> Result<IdSpace, String> {
        IdSpace::new(self.id_min, self.id_max)
    }
}

/// Issues collision-free token identifiers.
///
/// Issuance is serialized through an internal lock that also owns the RNG.
pub struct IdentifierIssuer {
    local: Arc<dyn LocalRegistry>,
    remote: Option<Arc<dyn RemoteRegistry>>,
    space: IdSpace,
    max_draws: u64,
    retry: RetryPolicy,
    rng: Mutex<StdRng>,
}

impl IdentifierIssuer {
    /// Create an issuer over `space`
    pub fn new(
        local: Arc<dyn LocalRegistry>,
        remote: Option<Arc<dyn RemoteRegistry>>,
        space: IdSpace,
        max_draws: u64,
        retry: RetryPolicy,
    ) -> Self {
        info!(
            "Identifier issuer: space=[{}, {}], max_draws={}, remote={}",
            space.min,
            space.max,
            max_draws,
            remote.is_some()
        );
        Self {
            local,
            remote,
            space,
            max_draws: max_draws.max(1),
            retry,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Use a deterministic RNG
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Issue a fresh identifier.
    ///
    /// When the whole space fits in the draw budget, candidates are drawn
    /// without replacement, so a free id is always found and a full space
    /// fails after exactly `size` draws. Larger spaces are sampled with
    /// replacement for at most `max_draws` draws.
    pub async fn issue(&self) -> Result<TokenId, IssueError> {
        let mut rng = self.rng.lock().await;
        let remote_used = self.fetch_remote().await?;

        let space = self.space;
        let exhaustive = usize::try_from(space.size())
            .ok()
            .filter(|&size| size as u128 <= u128::from(self.max_draws));

        let candidates: Box<dyn Iterator<Item = TokenId> + Send + '_> = match exhaustive {
            Some(size) => {
                let order = rand::seq::index::sample(&mut *rng, size, size);
                Box::new(order.into_iter().map(move |offset| space.min + offset as TokenId))
            }
            None => Box::new((0..self.max_draws).map(move |_| space.sample(&mut *rng))),
        };

        let mut draws = 0;
        for candidate in candidates {
            draws += 1;

            if remote_used.contains(&candidate) {
                debug!("Draw {}: {} already used remotely", draws, candidate);
                continue;
            }

            if self.local.try_record(candidate).await.map_err(IssueError::Local)? {
                info!("Issued token id {} after {} draw(s)", candidate, draws);
                return Ok(candidate);
            }
            debug!("Draw {}: {} already recorded locally", draws, candidate);
        }

        error!("Identifier space exhausted after {} draws", draws);
        Err(IssueError::Exhausted { draws })
    }

    async fn fetch_remote(&self) -> Result<HashSet<TokenId>, IssueError> {
        let Some(remote) = &self.remote else {
            return Ok(HashSet::new());
        };

        retry(&self.retry, "remote registry query", |_| remote.list_used_ids())
            .await
            .map_err(|e| {
                warn!("Remote registry unavailable, issuance aborted: {}", e);
                IssueError::RemoteUnavailable(e)
            })
    }

    /// The id space
    pub fn space(&self) -> IdSpace {
        self.space
    }
}
