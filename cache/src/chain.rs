//! Fallthrough over an ordered list of data sources.
//!
//! A typical chain is "cache, then database": the cache answers what it can,
//! the database answers the rest, and the cache is refilled on the way back.

use crate::error::Result;
use crate::keys::KeySuffix;
use crate::partial::{EntryShape, FetchResponse, PartialMapperResponse, PartialResultFetcher};
use crate::refresh::RefreshStrategy;

use core::fmt;
use std::collections::HashMap;
use std::hash::Hash;

use tracing::trace;

/// One data source in a chain.
///
/// `Ok(None)` means the source had nothing. A response with a residual means
/// it had some of the data.
pub trait DomainMapper<Req, Resp>: Send + Sync {
  fn execute(&self, request: &Req) -> Result<Option<PartialMapperResponse<Req, Resp>>>;
}

impl<S, K> DomainMapper<Vec<K>, Vec<(K, S::Value)>> for PartialResultFetcher<S>
where
  S: EntryShape,
  K: KeySuffix + Clone,
{
  fn execute(&self, request: &Vec<K>) -> Result<Option<FetchResponse<K, S::Value>>> {
    let response = self.fetch(request);
    if response.found.is_empty() && !request.is_empty() {
      return Ok(None);
    }
    Ok(Some(response))
  }
}

/// Adapts a closure into a [`DomainMapper`] that always answers in full.
pub struct SourceFn<F>(pub F);

impl<Req, Resp, F> DomainMapper<Req, Resp> for SourceFn<F>
where
  F: Fn(&Req) -> Result<Option<Resp>> + Send + Sync,
{
  fn execute(&self, request: &Req) -> Result<Option<PartialMapperResponse<Req, Resp>>> {
    Ok((self.0)(request)?.map(PartialMapperResponse::complete))
  }
}

/// Combines data found at one level with data found further down.
pub trait MergeResults {
  fn merge(self, deeper: Self) -> Self;
}

impl<T> MergeResults for Vec<T> {
  fn merge(mut self, deeper: Self) -> Self {
    self.extend(deeper);
    self
  }
}

impl<K: Eq + Hash, V> MergeResults for HashMap<K, V> {
  fn merge(mut self, deeper: Self) -> Self {
    self.extend(deeper);
    self
  }
}

/// A source plus the strategy that refills it from deeper sources.
pub struct DataSource<Req, Resp> {
  mapper: Box<dyn DomainMapper<Req, Resp>>,
  refresher: Option<Box<dyn RefreshStrategy<Req, Resp>>>,
}

impl<Req, Resp> DataSource<Req, Resp> {
  pub fn new<M>(mapper: M) -> Self
  where
    M: DomainMapper<Req, Resp> + 'static,
  {
    Self {
      mapper: Box::new(mapper),
      refresher: None,
    }
  }

  pub fn refreshed_by<R>(mut self, refresher: R) -> Self
  where
    R: RefreshStrategy<Req, Resp> + 'static,
  {
    self.refresher = Some(Box::new(refresher));
    self
  }
}

/// Asks each source in turn until the request is satisfied.
///
/// A source that misses passes the whole request down; a source that finds
/// part of it passes only the residual. When a deeper source answers, each
/// shallower source with a refresher is refreshed with the request it could
/// not satisfy and the deeper data, deepest first.
pub struct ChainedMapper<Req, Resp> {
  sources: Vec<DataSource<Req, Resp>>,
}

impl<Req, Resp> fmt::Debug for ChainedMapper<Req, Resp> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ChainedMapper")
      .field("sources", &self.sources.len())
      .finish()
  }
}

impl<Req, Resp> ChainedMapper<Req, Resp>
where
  Resp: MergeResults,
{
  pub fn new(sources: Vec<DataSource<Req, Resp>>) -> Self {
    Self { sources }
  }

  /// Runs the chain. `Ok(None)` when no source had anything.
  pub fn execute(&self, request: &Req) -> Result<Option<Resp>> {
    self.execute_from(0, request)
  }

  fn execute_from(&self, level: usize, request: &Req) -> Result<Option<Resp>> {
    let source = match self.sources.get(level) {
      Some(source) => source,
      None => return Ok(None),
    };

    match source.mapper.execute(request)? {
      Some(PartialMapperResponse {
        found,
        residual: None,
      }) => {
        trace!(level, "chain satisfied");
        Ok(Some(found))
      }
      Some(PartialMapperResponse {
        found,
        residual: Some(residual),
      }) => {
        trace!(level, "chain partially satisfied, descending with residual");
        match self.execute_from(level + 1, &residual)? {
          Some(deeper) => {
            Self::refill(source, &residual, &deeper)?;
            Ok(Some(found.merge(deeper)))
          }
          None => Ok(Some(found)),
        }
      }
      None => {
        trace!(level, "chain missed, descending");
        let deeper = self.execute_from(level + 1, request)?;
        if let Some(data) = &deeper {
          Self::refill(source, request, data)?;
        }
        Ok(deeper)
      }
    }
  }

  fn refill(source: &DataSource<Req, Resp>, request: &Req, data: &Resp) -> Result<()> {
    match &source.refresher {
      Some(refresher) => refresher.refresh(request, data),
      None => Ok(()),
    }
  }
}
