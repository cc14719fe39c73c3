//! Reading synthetic LES blocks and writing fields back out.

use block_netcdf::{read_field, read_shape, write_field, BlockFile, Field, HorizontalAxis, NetCdfError};
use test_utils::{block_scalar, block_value, centre_coordinate, LesRun};

#[test]
fn test_block_file_lists_data_variables() {
    let dir = tempfile::tempdir().unwrap();
    let run = LesRun::new("rico", 1, 1, 4, 3);
    let paths = run.write_3d(dir.path());

    let block = BlockFile::open(&paths[0]).unwrap();
    let mut names = block.data_variable_names();
    names.sort();
    assert_eq!(names, vec!["q", "u", "w"]);
    assert!(block.variable_names().contains(&"xt".to_string()));
}

#[test]
fn test_read_shape_reads_header() {
    let dir = tempfile::tempdir().unwrap();
    let run = LesRun::new("rico", 1, 1, 4, 3).with_levels(5);
    let paths = run.write_3d(dir.path());

    let shape = read_shape(&paths[0], "u").unwrap();
    assert_eq!(shape.dim_names(), vec!["time", "xm", "yt", "zt"]);
    assert_eq!(shape.horizontal_extent().unwrap(), (4, 3));
    assert_eq!(shape.len_of("zt"), Some(5));
}

#[test]
fn test_read_field_values_and_coordinates() {
    let dir = tempfile::tempdir().unwrap();
    let run = LesRun::new("rico", 2, 2, 4, 3);
    run.write_3d(dir.path());

    let field = read_field(run.block_path_3d(dir.path(), 1, 1), "w").unwrap();
    assert_eq!(field.shape(), &[2, 4, 3, 3]);
    assert_eq!(field.data()[[1, 2, 0, 2]] as f32, block_value(1, 4 + 2, 3, 2));

    let xt = field.coordinate("xt").unwrap();
    assert_eq!(xt.values[0], centre_coordinate(4));
    assert!(field
        .attributes()
        .iter()
        .any(|(name, _)| name == "units"));
}

#[test]
fn test_missing_variable_lists_available() {
    let dir = tempfile::tempdir().unwrap();
    let run = LesRun::new("rico", 1, 1, 2, 2);
    let paths = run.write_3d(dir.path());

    let err = read_field(&paths[0], "theta").unwrap_err();
    match &err {
        NetCdfError::VariableNotFound { name, available, .. } => {
            assert_eq!(name, "theta");
            assert!(available.contains(&"w".to_string()));
            assert!(!available.contains(&"xt".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("the following variables are available"));
}

#[test]
fn test_write_then_read_preserves_layout() {
    let dir = tempfile::tempdir().unwrap();
    let run = LesRun::new("rico", 1, 1, 3, 2);
    let paths = run.write_3d(dir.path());

    let field = read_field(&paths[0], "q").unwrap().select_index("time", 1).unwrap();
    let out = dir.path().join("q.nc");
    write_field(&field, &out).unwrap();

    let back = read_field(&out, "q").unwrap();
    assert_eq!(back.dims(), field.dims());
    assert_eq!(back.values(), field.values());
    assert_eq!(back.coordinate("time").unwrap().values, vec![120.0]);
}

#[test]
fn test_scalar_diagnostic_is_horizontally_scalar() {
    let dir = tempfile::tempdir().unwrap();
    let run = LesRun::new("rico", 2, 1, 2, 2);
    run.write_2d(dir.path(), "xy");

    let lcl: Field = read_field(run.block_path_2d(dir.path(), "xy", 1, 0), "lcl").unwrap();
    assert!(lcl.is_horizontally_scalar());
    assert_eq!(lcl.values()[1] as f32, block_scalar(1, 1, 0));

    let lwp = read_field(run.block_path_2d(dir.path(), "xy", 1, 0), "lwp").unwrap();
    assert_eq!(lwp.dimension_for(HorizontalAxis::X), Some("xt"));
}
