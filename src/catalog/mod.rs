use std::path::PathBuf;

use log::info;
use rand::seq::{IteratorRandom, SliceRandom};
use rand::Rng;
use serde::Deserialize;

use crate::error::{Error, Result};

/// The gamemode that marks a small-scale layer, always offered as the
/// first candidate whenever candidates are drawn from the catalog.
const SKIRMISH_GAMEMODE: &str = "Skirmish";

/// One entry of the map layers JSON document.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MapLayer {
    pub name: String,
    pub gamemode: String,
}

impl MapLayer {
    pub fn is_skirmish(&self) -> bool {
        self.gamemode == SKIRMISH_GAMEMODE
    }
}

/// Where to fetch the map layers document from.
#[derive(Debug, Clone)]
pub enum CatalogSource {
    File(PathBuf),
    Url(String),
}

/// The full set of known map layers, loaded from a local file or a remote
/// JSON document.
#[derive(Debug, Clone)]
pub struct LayerCatalog {
    layers: Vec<MapLayer>,
}

impl LayerCatalog {
    pub fn new(layers: Vec<MapLayer>) -> Self {
        Self { layers }
    }

    /// Loads the layer catalog from the given source.
    pub async fn load(source: &CatalogSource) -> Result<Self> {
        let layers: Vec<MapLayer> = match source {
            CatalogSource::File(path) => {
                info!("Loading map layers from file {}", path.display());
                serde_json::from_str(&std::fs::read_to_string(path)?)?
            }
            CatalogSource::Url(url) => {
                info!("Fetching map layers from {}", url);
                reqwest::get(url).await?.error_for_status()?.json().await?
            }
        };
        Ok(Self::new(layers))
    }

    /// Draws one random skirmish layer from the catalog.
    pub fn random_skirmish_layer<R: Rng>(&self, rng: &mut R) -> Result<String> {
        self.layers
            .iter()
            .filter(|layer| layer.is_skirmish())
            .choose(rng)
            .map(|layer| layer.name.clone())
            .ok_or_else(|| Error::NoSuchGamemode(SKIRMISH_GAMEMODE.to_string()))
    }

    /// Draws a randomized candidate set: one skirmish opener followed by
    /// `count` distinct random non-skirmish layers.
    pub fn random_candidates<R: Rng>(&self, rng: &mut R, count: usize) -> Result<Vec<String>> {
        let mut candidates = vec![self.random_skirmish_layer(rng)?];
        let picks = self
            .layers
            .iter()
            .filter(|layer| !layer.is_skirmish())
            .collect::<Vec<_>>()
            .choose_multiple(rng, count)
            .map(|layer| layer.name.clone())
            .collect::<Vec<_>>();
        candidates.extend(picks);
        Ok(candidates)
    }
}
