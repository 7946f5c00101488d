//! Per-event reconstruction chain: clustering, cluster building, matching.

use crate::cog::ClusterBuilder;
use crate::island::IslandClustering;
use crate::matching::{ClusterMatcher, MatchConfig};
use crate::truth::TruthClustering;
use caloreco_core::{
    ClusterCollection, ClusteringInput, CogConfig, DetectorHits, DetectorOutput, Error, Event,
    EventOutput, GeometryService, HitIndex, IslandConfig, ProtoCluster, ProtoClustering, Result,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Reconstruction settings of one calorimeter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorConfig {
    /// Detector name, matched against [`DetectorHits::detector`].
    pub name: String,
    /// Island clustering; no island clusters are built when unset.
    #[serde(default)]
    pub island: Option<IslandConfig>,
    /// Cluster building for island proto-clusters.
    #[serde(default)]
    pub cog: CogConfig,
    /// Cluster building for truth-seeded proto-clusters; truth clustering
    /// is skipped when unset.
    #[serde(default)]
    pub truth_cog: Option<CogConfig>,
}

impl DetectorConfig {
    /// Island clustering with default settings.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            island: Some(IslandConfig::default()),
            cog: CogConfig::default(),
            truth_cog: None,
        }
    }

    /// Backward hadronic endcap.
    #[must_use]
    pub fn hcal_endcap_n() -> Self {
        Self {
            name: "HcalEndcapN".to_string(),
            island: Some(IslandConfig::hcal_endcap_n()),
            cog: CogConfig::hcal_endcap_n(),
            truth_cog: Some(CogConfig::truth_clusters()),
        }
    }

    /// Far-forward B0 electromagnetic calorimeter.
    #[must_use]
    pub fn b0_ecal() -> Self {
        Self {
            name: "B0ECal".to_string(),
            island: Some(IslandConfig::b0_ecal()),
            cog: CogConfig::b0_ecal(),
            truth_cog: Some(CogConfig::truth_clusters()),
        }
    }

    /// Backward electromagnetic endcap.
    #[must_use]
    pub fn ecal_endcap_n() -> Self {
        Self {
            name: "EcalEndcapN".to_string(),
            island: Some(IslandConfig::ecal_endcap_n()),
            cog: CogConfig::ecal_endcap_n(),
            truth_cog: Some(CogConfig::ecal_endcap_n()),
        }
    }

    /// Sets the island clustering configuration.
    #[must_use]
    pub fn with_island(mut self, island: IslandConfig) -> Self {
        self.island = Some(island);
        self
    }

    /// Disables island clustering.
    #[must_use]
    pub fn without_island(mut self) -> Self {
        self.island = None;
        self
    }

    /// Sets the cluster building configuration for island clusters.
    #[must_use]
    pub fn with_cog(mut self, cog: CogConfig) -> Self {
        self.cog = cog;
        self
    }

    /// Enables truth clustering with the given cluster building.
    #[must_use]
    pub fn with_truth_cog(mut self, cog: CogConfig) -> Self {
        self.truth_cog = Some(cog);
        self
    }
}

/// Configuration of a full reconstruction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReconstructionConfig {
    /// Calorimeters, in processing order.
    pub detectors: Vec<DetectorConfig>,
    /// Matcher settings.
    pub matching: MatchConfig,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            detectors: vec![
                DetectorConfig::ecal_endcap_n(),
                DetectorConfig::hcal_endcap_n(),
                DetectorConfig::b0_ecal(),
            ],
            matching: MatchConfig::default(),
        }
    }
}

impl ReconstructionConfig {
    /// A configuration with no detectors.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            detectors: Vec::new(),
            matching: MatchConfig::default(),
        }
    }

    /// Appends a detector.
    #[must_use]
    pub fn with_detector(mut self, detector: DetectorConfig) -> Self {
        self.detectors.push(detector);
        self
    }

    /// Sets the matcher settings.
    #[must_use]
    pub fn with_matching(mut self, matching: MatchConfig) -> Self {
        self.matching = matching;
        self
    }

    /// Load configuration from a JSON file.
    ///
    /// # Errors
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::config(format!("cannot open {}: {e}", path.display())))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::config(format!("invalid configuration in {}: {e}", path.display())))
    }

    /// Load configuration from a JSON string.
    ///
    /// # Errors
    /// Returns a configuration error if the string does not parse.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::config(format!("invalid configuration: {e}")))
    }

    /// Serializes the configuration to pretty-printed JSON.
    ///
    /// # Errors
    /// Returns a configuration error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Checks every detector configuration.
    ///
    /// # Errors
    /// Returns a configuration error for blank or repeated detector names
    /// and for any invalid stage configuration.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for detector in &self.detectors {
            if detector.name.trim().is_empty() {
                return Err(Error::config("detector name must not be blank"));
            }
            if !names.insert(detector.name.as_str()) {
                return Err(Error::config(format!(
                    "detector \"{}\" configured twice",
                    detector.name
                )));
            }
            if let Some(island) = &detector.island {
                island.validate()?;
            }
            detector.cog.validate()?;
            if let Some(truth_cog) = &detector.truth_cog {
                truth_cog.validate()?;
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct DetectorChain {
    name: String,
    island: Option<IslandClustering>,
    builder: ClusterBuilder,
    truth_builder: Option<ClusterBuilder>,
}

impl DetectorChain {
    fn new(config: &DetectorConfig, geometry: &dyn GeometryService) -> Result<Self> {
        let with_context = |err: Error| match err {
            Error::Config(message) => Error::config(format!("{}: {message}", config.name)),
            other => other,
        };
        let island = config
            .island
            .clone()
            .map(IslandClustering::new)
            .transpose()
            .map_err(with_context)?;
        let builder =
            ClusterBuilder::with_geometry(config.cog.clone(), geometry).map_err(with_context)?;
        let truth_builder = config
            .truth_cog
            .clone()
            .map(|cog| ClusterBuilder::with_geometry(cog, geometry))
            .transpose()
            .map_err(with_context)?;
        Ok(Self {
            name: config.name.clone(),
            island,
            builder,
            truth_builder,
        })
    }

    #[instrument(name = "reco.detector", skip_all, fields(detector = %self.name))]
    fn process(&self, hits: Option<&DetectorHits>) -> Result<DetectorOutput> {
        let mut output = DetectorOutput {
            detector: self.name.clone(),
            ..DetectorOutput::default()
        };
        let Some(hits) = hits else {
            debug!("no hits for detector in this event");
            return Ok(output);
        };

        let truth_of = hits.sim_hits.as_deref().map(|sim_hits| {
            let (truth_of, orphans) = HitIndex::new(&hits.hits).sim_truth(&hits.hits, sim_hits);
            if !orphans.is_empty() {
                debug!(orphans = orphans.len(), "truth hits without a reconstructed hit");
            }
            truth_of
        });
        let build = |builder: &ClusterBuilder, protos: &[ProtoCluster]| match &truth_of {
            Some(truth_of) => builder.build_all_with_truth(protos, &hits.hits, truth_of),
            None => builder.build_all(protos, &hits.hits),
        };

        if let Some(island) = &self.island {
            output.proto_clusters = island.cluster(&ClusteringInput::new(&hits.hits))?;
            output.clusters = build(&self.builder, output.proto_clusters.as_slice());
        }

        if let Some(truth_builder) = &self.truth_builder {
            match &hits.sim_hits {
                Some(sim_hits) => {
                    let input = ClusteringInput::new(&hits.hits).with_sim_hits(sim_hits);
                    let protos: Vec<ProtoCluster> = TruthClustering::new().cluster(&input)?;
                    output.truth_clusters = Some(build(truth_builder, protos.as_slice()));
                }
                None => debug!("no truth hits, truth clustering skipped"),
            }
        }
        Ok(output)
    }
}

/// The full reconstruction: built once, then shared by all event threads.
#[derive(Debug)]
pub struct Reconstruction {
    detectors: Vec<DetectorChain>,
    matcher: ClusterMatcher,
}

impl Reconstruction {
    /// Builds every stage, failing on any configuration problem.
    ///
    /// # Errors
    /// Returns a configuration error for an invalid configuration or a
    /// geometry constant that is not defined.
    pub fn new(config: &ReconstructionConfig, geometry: &dyn GeometryService) -> Result<Self> {
        config.validate()?;
        let detectors = config
            .detectors
            .iter()
            .map(|detector| DetectorChain::new(detector, geometry))
            .collect::<Result<Vec<_>>>()?;
        info!(detectors = detectors.len(), "reconstruction configured");
        Ok(Self {
            detectors,
            matcher: ClusterMatcher::new(config.matching.clone()),
        })
    }

    /// Names of the configured detectors, in processing order.
    pub fn detector_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.detectors.iter().map(|d| d.name.as_str())
    }

    /// Reconstructs one event.
    ///
    /// # Errors
    /// Propagates configuration errors surfaced by the event's data, such
    /// as truth hits that do not line up with the reconstructed hits.
    #[instrument(name = "reco.event", skip_all, fields(event = event.number))]
    pub fn process_event(&self, event: &Event) -> Result<EventOutput> {
        let detectors = self
            .detectors
            .iter()
            .map(|chain| chain.process(event.detector(&chain.name)))
            .collect::<Result<Vec<_>>>()?;

        let collections: Vec<&ClusterCollection> = detectors.iter().map(|d| &d.clusters).collect();
        let matched = self.matcher.execute_collections(
            &event.truth_particles,
            &event.charged_particles,
            &event.charged_associations,
            &collections,
        )?;

        Ok(EventOutput {
            number: event.number,
            detectors,
            particles: matched.particles,
            associations: matched.associations,
        })
    }

    /// Reconstructs events in parallel. Results keep the input order.
    pub fn process_events(&self, events: &[Event]) -> Vec<Result<EventOutput>> {
        events
            .par_iter()
            .map(|event| self.process_event(event))
            .collect()
    }
}
