mod common;

use approx::assert_relative_eq;
use caloreco_algorithms::{
    ClusterBuilder, ClusterMatcher, ClusteringInput, DetectorConfig, IslandClustering,
    ProtoClustering, Reconstruction, ReconstructionConfig,
};
use caloreco_core::units::{CM, MEV};
use caloreco_core::{
    ClusterAssociation, ClusterCollection, CogConfig, ConstantTable, DetectorHits,
    DistanceMetric, Event, IslandConfig, McId, ParticleAssociation, ProtoCluster,
    ReconstructedParticle, TruthParticle, Vector3,
};
use common::{plane_hit, with_recording};
use tracing::Level;

fn plane_island() -> IslandConfig {
    IslandConfig::new()
        .with_neighbour(DistanceMetric::LocalDistXY, [2.0 * CM, 2.0 * CM])
        .with_split_cluster(false)
}

fn plane_detector() -> DetectorConfig {
    DetectorConfig::new("Plane").with_island(plane_island())
}

#[test]
fn test_three_hit_island() {
    let hits = vec![
        plane_hit(1, 0.0, 0.0, 100.0),
        plane_hit(2, 1.0, 0.0, 5.0),
        plane_hit(3, 0.0, 1.0, 5.0),
    ];
    let clustering = IslandClustering::new(plane_island()).unwrap();
    let protos = clustering.cluster(&ClusteringInput::new(&hits)).unwrap();
    assert_eq!(protos, vec![ProtoCluster::unweighted(vec![0, 1, 2])]);

    let builder = ClusterBuilder::new(CogConfig::new().with_samp_frac(1.0)).unwrap();
    let (cluster, _) = builder.build(&protos[0], &hits).unwrap();
    assert_relative_eq!(cluster.energy, 110.0 * MEV, epsilon = 1e-12);

    // the log-weighted centroid sits well inside the triangle, near the seed
    let plain_mean = 1.0 / 3.0;
    assert!(cluster.position.x > 0.0 && cluster.position.x < plain_mean);
    assert!(cluster.position.y > 0.0 && cluster.position.y < plain_mean);
    assert_relative_eq!(cluster.position.z, 10.0, epsilon = 1e-12);
}

#[test]
fn test_groups_twenty_cm_apart() {
    let hits = vec![
        plane_hit(1, 0.0, 0.0, 50.0),
        plane_hit(2, 1.0, 0.0, 20.0),
        plane_hit(3, 20.0, 0.0, 40.0),
        plane_hit(4, 21.0, 0.0, 10.0),
    ];
    let clustering = IslandClustering::new(plane_island()).unwrap();
    let protos = clustering.cluster(&ClusteringInput::new(&hits)).unwrap();
    assert_eq!(protos.len(), 2);
    assert_eq!(protos[0].hits, vec![0, 1]);
    assert_eq!(protos[1].hits, vec![2, 3]);
}

fn photon_event() -> Event {
    let hits = vec![
        plane_hit(1, 0.0, 0.0, 800.0).with_truth(1),
        plane_hit(2, 1.0, 0.0, 150.0).with_truth(1),
        plane_hit(3, 0.0, 1.0, 50.0).with_truth(1),
        plane_hit(4, 30.0, 0.0, 300.0).with_truth(2),
    ];
    Event {
        number: 17,
        detectors: vec![DetectorHits::new("Plane", hits)],
        truth_particles: vec![
            TruthParticle::new(1, 22, 0.0, 0.0, Vector3::new(0.0, 0.0, 1.0)),
            TruthParticle::new(2, 211, 1.0, 0.1396, Vector3::new(3.0, 0.0, 1.0)),
            TruthParticle::new(3, 22, 0.0, 0.0, Vector3::new(0.0, 1.0, 1.0)),
        ],
        charged_particles: vec![ReconstructedParticle::charged(
            211,
            1.0,
            Vector3::new(3.0, 0.0, 1.0),
            0.1396,
        )],
        charged_associations: vec![ParticleAssociation {
            rec: 0,
            sim: McId(2),
            weight: 1.0,
        }],
    }
}

#[test]
fn test_photon_event_end_to_end() {
    let config = ReconstructionConfig::empty().with_detector(plane_detector());
    let reco = Reconstruction::new(&config, &ConstantTable::new()).unwrap();
    let event = photon_event();
    let output = reco.process_event(&event).unwrap();

    assert_eq!(output.number, 17);
    assert_eq!(output.detectors[0].clusters.len(), 2);

    // charged pion first and untouched, then the photon
    assert_eq!(output.particles.len(), 2);
    assert_eq!(output.particles[0], event.charged_particles[0]);
    assert_eq!(output.associations[0], event.charged_associations[0]);

    let photon = &output.particles[1];
    assert_eq!(photon.pdg, 22);
    assert_eq!(photon.charge, 0.0);
    assert!(!photon.from_tracking);
    assert_relative_eq!(photon.energy, 1.0, epsilon = 1e-12);
    assert_relative_eq!(photon.p(), photon.energy, epsilon = 1e-12);
    assert_eq!(output.associations[1].sim, McId(1));
    assert_eq!(output.associations[1].rec, 1);

    // truth particle 3 left nothing behind
    assert!(output.associations.iter().all(|a| a.sim != McId(3)));
}

#[test]
fn test_repeated_runs_are_identical() {
    let config = ReconstructionConfig::empty().with_detector(
        plane_detector().with_island(plane_island().with_split_cluster(true)),
    );
    let reco = Reconstruction::new(&config, &ConstantTable::new()).unwrap();
    let event = photon_event();
    let first = reco.process_event(&event).unwrap();
    let second = reco.process_event(&event).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_parallel_events_keep_order() {
    let config = ReconstructionConfig::empty().with_detector(plane_detector());
    let reco = Reconstruction::new(&config, &ConstantTable::new()).unwrap();
    let events: Vec<Event> = (0..32)
        .map(|number| Event {
            number,
            ..photon_event()
        })
        .collect();

    let outputs = reco.process_events(&events);
    assert_eq!(outputs.len(), events.len());
    for (event, output) in events.iter().zip(&outputs) {
        let output = output.as_ref().unwrap();
        assert_eq!(output.number, event.number);
        assert_eq!(*output, reco.process_event(event).unwrap());
    }
}

#[test]
fn test_mismatched_truth_hits_fail_the_event() {
    let config = ReconstructionConfig::empty()
        .with_detector(plane_detector().with_truth_cog(CogConfig::truth_clusters()));
    let reco = Reconstruction::new(&config, &ConstantTable::new()).unwrap();

    let mut event = photon_event();
    event.detectors[0].sim_hits = Some(Vec::new());
    let err = reco.process_event(&event).unwrap_err();
    assert!(err.is_config());
}

#[test]
fn test_unknown_truth_id_warns_and_continues() {
    let clusters = ClusterCollection {
        clusters: vec![caloreco_core::Cluster {
            energy: 1.0,
            position: Vector3::new(0.0, 10.0, 0.0),
            ..caloreco_core::Cluster::default()
        }],
        associations: vec![ClusterAssociation {
            rec: 0,
            sim: McId(404),
            weight: 1.0,
        }],
    };
    let truth = vec![TruthParticle::new(1, 22, 0.0, 0.0, Vector3::new(0.0, 1.0, 0.0))];

    let (results, events) = with_recording(|| {
        ClusterMatcher::default().execute_collections(&truth, &[], &[], &[&clusters])
    });
    let results = results.unwrap();
    assert!(results.particles.is_empty());
    assert!(events
        .iter()
        .any(|e| e.level == Level::WARN && e.message().contains("skipping cluster association")));
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reco.json");
    let config = ReconstructionConfig::default();
    std::fs::write(&path, config.to_json().unwrap()).unwrap();
    assert_eq!(ReconstructionConfig::from_file(&path).unwrap(), config);
    assert!(ReconstructionConfig::from_file(dir.path().join("missing.json"))
        .unwrap_err()
        .is_config());
}

#[test]
fn test_config_from_hand_written_json() {
    let json = r#"{
        "detectors": [{
            "name": "EcalEndcapN",
            "island": {
                "sectorDist": 5.0,
                "dimScaledLocalDistXY": [1.8, 1.8],
                "splitCluster": true,
                "minClusterHitEdep": 0.001,
                "minClusterCenterEdep": 0.03,
                "transverseEnergyProfileMetric": "globalDistEtaPhi",
                "transverseEnergyProfileScale": 0.08
            },
            "cog": { "energyWeight": "log", "sampFrac": 1.0, "logWeightBase": 4.6 }
        }],
        "matching": { "duplicatePolicy": "highestEnergy" }
    }"#;
    let config = ReconstructionConfig::from_json(json).unwrap();
    let detector = &config.detectors[0];
    let island = detector.island.as_ref().unwrap();
    assert_eq!(
        island.neighbour().unwrap(),
        (DistanceMetric::DimScaledLocalDistXY, [1.8, 1.8])
    );
    assert_relative_eq!(detector.cog.log_weight_base, 4.6);
    assert!(detector.truth_cog.is_none());
    assert_eq!(
        config.matching.duplicate_policy,
        caloreco_algorithms::DuplicatePolicy::HighestEnergy
    );
    assert!(Reconstruction::new(&config, &ConstantTable::new()).is_ok());
}

#[test]
fn test_hits_without_cell_size_are_reported() {
    let clustering = IslandClustering::new(IslandConfig::b0_ecal()).unwrap();
    let hits = vec![
        plane_hit(1, 0.0, 0.0, 100.0),
        plane_hit(2, 0.5, 0.0, 50.0).with_dimension(Vector3::ZERO),
        plane_hit(3, 1.0, 0.0, 20.0).with_dimension(Vector3::ZERO),
    ];

    let (protos, events) = with_recording(|| clustering.cluster(&ClusteringInput::new(&hits)));
    assert_eq!(protos.unwrap(), vec![ProtoCluster::unweighted(vec![0])]);

    let warnings: Vec<_> = events.iter().filter(|e| e.level == Level::WARN).collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message().contains("cell dimension"));
    assert_eq!(warnings[0].fields.get("hits").map(String::as_str), Some("2"));
}
