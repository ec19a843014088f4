use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;

use georesolve::config::Config;
use georesolve::store::{GeometryStore, NdjsonStore};
use georesolve::{ElementId, GeoPoint, Resolver, Snapshot};

const BOUNDARIES: &str = r#"{"kind":"relation","id":51477,"admin_level":2,"name":"Deutschland","name_en":"Germany","tags":{"ISO3166-1":"DE"},"members":[{"kind":"relation","id":62422,"role":"subarea"},{"kind":"relation","id":999,"role":"subarea"}],"geometry":{"type":"Polygon","coordinates":[[[5.9,47.3],[15.0,47.3],[15.0,55.1],[5.9,55.1],[5.9,47.3]]]}}
{"kind":"relation","id":62422,"admin_level":4,"name":"Berlin","members":[{"kind":"node","id":240109189,"role":"admin_centre"}],"geometry":{"type":"MultiPolygon","coordinates":[[[[13.08,52.33],[13.76,52.33],[13.76,52.68],[13.08,52.68]]]]}}
{"kind":"relation","id":2145268,"admin_level":4,"name":"Bayern","name_en":"Bavaria","geometry":{"type":"Polygon","coordinates":[[[8.9,47.2],[13.9,47.2],[13.9,50.6],[8.9,50.6],[8.9,47.2]]]}}
{"kind":"relation","id":5,"admin_level":4,"name":"Nowhere","geometry":null}
"#;

const PLACES: &str = r#"{"kind":"node","id":240109189,"place":"city","name":"Berlin","population":3769495,"lat":52.5170365,"lon":13.3888599}
{"kind":"node","id":21585077,"place":"city","name":"München","name_en":"Munich","population":1512491,"lat":48.1371079,"lon":11.5753822}
"#;

fn write_inputs(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let boundaries = dir.join("boundaries.ndjson");
    std::fs::write(&boundaries, BOUNDARIES).unwrap();

    let places = dir.join("places.ndjson.gz");
    let mut encoder = GzEncoder::new(File::create(&places).unwrap(), Compression::default());
    encoder.write_all(PLACES.as_bytes()).unwrap();
    encoder.finish().unwrap();

    (boundaries, places)
}

#[test]
fn test_build_persist_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let (boundaries, places) = write_inputs(dir.path());
    let edges = dir.path().join("edges.csv");

    let config_path = dir.path().join("georesolve.toml");
    std::fs::write(
        &config_path,
        format!(
            "[store]\nboundaries = {:?}\nplaces = {:?}\nedges = {:?}\n\n[resolver]\nprefer_english_names = false\n",
            boundaries, places, edges
        ),
    )
    .unwrap();
    let config = Config::load_from_file(&config_path).unwrap();
    assert!(!config.resolver.prefer_english_names);

    let store = NdjsonStore::open(&config.store.boundaries, &config.store.places).unwrap();
    assert_eq!(store.all_places().unwrap().len(), 2);

    let built = Snapshot::load(&store, &config.builder).unwrap();
    let report = *built.report().unwrap();
    // Relation 999 is not in the store
    assert_eq!(report.dropped_members, 1);
    assert_eq!(built.diagnostics().snapshot().dropped_member_refs, 1);
    assert_eq!(built.diagnostics().snapshot().null_geometry_boundaries, 1);

    let edges_path = config.store.edges.clone().unwrap();
    built.graph().write_csv(&edges_path).unwrap();
    let reloaded = Snapshot::load_with_edges(&store, &edges_path).unwrap();

    let native = Resolver::new(Arc::new(built), &config.resolver);
    let from_disk = Resolver::new(Arc::new(reloaded), &config.resolver);

    let berlin = GeoPoint::new(52.52, 13.40);
    let loc = native.resolve(berlin).unwrap();
    assert_eq!(loc.city.as_deref(), Some("Berlin"));
    assert_eq!(loc.state.as_deref(), Some("Berlin"));
    assert_eq!(loc.country.as_deref(), Some("Deutschland"));
    assert_eq!(loc.country_code.as_deref(), Some("DE"));
    assert!(loc.is_exact());
    assert_eq!(from_disk.resolve(berlin).unwrap(), loc);

    // Bavaria has no explicit parent: its country comes from containment
    let munich = GeoPoint::new(48.14, 11.58);
    let loc = native.resolve(munich).unwrap();
    assert_eq!(loc.city.as_deref(), Some("München"));
    assert_eq!(loc.state_id, Some(ElementId::relation(2145268)));
    assert_eq!(loc.country_id, Some(ElementId::relation(51477)));
    assert!(loc.country_derived_from_state);
    assert_eq!(from_disk.resolve(munich).unwrap(), loc);
}

#[test]
fn test_english_names() {
    let dir = tempfile::tempdir().unwrap();
    let (boundaries, places) = write_inputs(dir.path());
    let store = NdjsonStore::open(&boundaries, &places).unwrap();
    let snapshot = Snapshot::load(&store, &Default::default()).unwrap();
    let resolver = Resolver::new(Arc::new(snapshot), &Default::default());

    let loc = resolver.resolve(GeoPoint::new(48.14, 11.58)).unwrap();
    assert_eq!(loc.city.as_deref(), Some("Munich"));
    assert_eq!(loc.state.as_deref(), Some("Bavaria"));
    assert_eq!(loc.country.as_deref(), Some("Germany"));
}
