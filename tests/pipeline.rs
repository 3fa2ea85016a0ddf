use std::fs;
use std::path::Path;

use feature_density::job::{self, prepare_index};
use feature_density::{DensityError, Emitter, JobConfig, RecordConfig, OUTSIDE_LABEL};

const ONE_SQUARE: &str = r#"{
    "type": "FeatureCollection",
    "features": [{
        "type": "Feature",
        "geometry": {"type": "Polygon", "coordinates": [[[0,0],[0,1],[1,1],[1,0],[0,0]]]},
        "properties": {"NAME": "A"}
    }]
}"#;

const OVERLAPPING: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {
            "type": "Feature",
            "geometry": {"type": "Polygon", "coordinates": [[[0,0],[0,1],[1,1],[1,0],[0,0]]]},
            "properties": {"NAME": "P1"}
        },
        {
            "type": "Feature",
            "geometry": {"type": "Polygon", "coordinates": [[[-1,-1],[-1,2],[2,2],[2,-1],[-1,-1]]]},
            "properties": {"NAME": "P2"}
        }
    ]
}"#;

const FEATURE_CLASS: &str = r#"{
    "objectIdFieldName": "OBJECTID",
    "geometryType": "esriGeometryPolygon",
    "spatialReference": {"wkid": 4326},
    "features": [
        {"attributes": {"NAME": "West", "OBJECTID": 1},
         "geometry": {"rings": [[[-10,0],[-10,10],[0,10],[0,0],[-10,0]]]}},
        {"attributes": {"OBJECTID": 2},
         "geometry": {"rings": [[[20,0],[20,10],[30,10],[30,0],[20,0]]]}}
    ]
}"#;

fn config_for(dir: &Path, polygons: &str, points: &str) -> JobConfig {
    let polygons_path = dir.join("polygons.json");
    let points_path = dir.join("points.csv");
    fs::write(&polygons_path, polygons).unwrap();
    fs::write(&points_path, points).unwrap();

    JobConfig {
        polygons_path,
        points_path,
        output_path: dir.join("out").join("counts.csv"),
        batch_size: 2,
        threads: Some(2),
        ..JobConfig::default()
    }
}

fn output_lines(config: &JobConfig) -> Vec<String> {
    fs::read_to_string(&config.output_path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn square_polygon_inside_and_outside() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path(), ONE_SQUARE, "0.5,0.5\n5,5\n0.25,0.75\nbad,row\n");

    let summary = job::run(&config).unwrap();

    assert_eq!(summary.stats.records, 4);
    assert_eq!(summary.stats.unparsable, 1);
    assert_eq!(summary.stats.outside, 1);
    assert_eq!(
        output_lines(&config),
        vec!["A,2".to_string(), format!("{},1", OUTSIDE_LABEL)]
    );
}

#[test]
fn overlapping_polygons_resolve_to_first_inserted() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path(), OVERLAPPING, "0.5,0.5\n1.5,1.5\n");

    job::run(&config).unwrap();

    assert_eq!(output_lines(&config), vec!["P1,1", "P2,1"]);
}

#[test]
fn filter_column_applies_per_row() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(
        dir.path(),
        ONE_SQUARE,
        "0.5,0.5,Downtown Urban\n0.5,0.5,Rural Area\n0.5,0.5\n10,20,URBAN fringe\n",
    );
    config.record = RecordConfig {
        filter_column: Some(2),
        filter_text: "urban".to_string(),
        ..RecordConfig::default()
    };

    let summary = job::run(&config).unwrap();

    assert_eq!(summary.stats.filtered, 1);
    // The two-field row has no filter column and passes unfiltered
    assert_eq!(
        output_lines(&config),
        vec!["A,2".to_string(), format!("{},1", OUTSIDE_LABEL)]
    );
}

#[test]
fn feature_class_fallback_and_unknown_label() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path(), FEATURE_CLASS, "-5,5\n25,5\n25,6\n100,80\n");

    let summary = job::run(&config).unwrap();

    assert_eq!(summary.features, 2);
    assert_eq!(
        output_lines(&config),
        vec![
            "Unknown,2".to_string(),
            "West,1".to_string(),
            format!("{},1", OUTSIDE_LABEL)
        ]
    );
}

#[test]
fn unparseable_polygons_fail_unless_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(dir.path(), "{\"type\": \"Nothing\"}", "0.5,0.5\n1,1\n");

    let err = job::run(&config).unwrap_err();
    assert!(err
        .chain()
        .any(|cause| matches!(cause.downcast_ref::<DensityError>(), Some(DensityError::NoFeatures { .. }))));
    assert!(!config.output_path.exists());

    config.allow_empty_polygons = true;
    let summary = job::run(&config).unwrap();
    assert_eq!(summary.stats.outside, 2);
    assert_eq!(output_lines(&config), vec![format!("{},2", OUTSIDE_LABEL)]);
}

#[test]
fn directory_input_and_gzip_files() {
    use std::io::Write;

    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(dir.path(), ONE_SQUARE, "");

    let points_dir = dir.path().join("points");
    fs::create_dir(&points_dir).unwrap();
    fs::write(points_dir.join("part-00000"), "0.5,0.5\n7,7\n").unwrap();
    fs::write(points_dir.join("_SUCCESS"), "").unwrap();
    let mut gz = flate2::write::GzEncoder::new(
        fs::File::create(points_dir.join("part-00001.gz")).unwrap(),
        flate2::Compression::default(),
    );
    gz.write_all(b"\"0.1\",\"0.9\"\n0.9,0.1\n").unwrap();
    gz.finish().unwrap();

    config.points_path = points_dir;
    config.separator = "\t".to_string();

    let summary = job::run(&config).unwrap();

    assert_eq!(summary.input_files, 2);
    assert_eq!(
        output_lines(&config),
        vec!["A\t3".to_string(), format!("{}\t1", OUTSIDE_LABEL)]
    );
}

#[test]
fn emitter_works_against_prepared_index() {
    let index = prepare_index(ONE_SQUARE.as_bytes(), false).unwrap();
    let config = RecordConfig::default();
    let emitter = Emitter::new(&index, &config);

    assert_eq!(emitter.emit("0.5,0.5"), Some(("A".to_string(), 1)));
    assert_eq!(emitter.emit("5,5"), Some((OUTSIDE_LABEL.to_string(), 1)));
    assert_eq!(emitter.emit("x,y"), None);
}
