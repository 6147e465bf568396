//! End-to-end behaviour of the array calculator against a store.

use std::sync::Arc;

use array_calc::calc::{CalcError, WarningKind};
use array_calc::data::model::ArrayData;
use array_calc::{
    array_calculator, AngleUnit, ArrayCalculator, AttributeMatrixType, DataArray, DataArrayPath,
    DataContainerArray, Initialization, ScalarType, StoreError,
};

const EPS: f64 = 1e-9;

fn cell_scope() -> DataArrayPath {
    DataArrayPath::new("ImageDataContainer", "CellAttributeMatrix", "")
}

/// The store built by the original regression script: 4×5×6 cells with an
/// Int32 array filled with 37.
fn image_store() -> DataContainerArray {
    let mut dca = DataContainerArray::new();
    dca.create_data_container("ImageDataContainer").unwrap();
    dca.create_attribute_matrix(&cell_scope(), AttributeMatrixType::Cell, vec![4, 5, 6])
        .unwrap();
    dca.create_data_array(
        &cell_scope().with_array("Int32Data"),
        ScalarType::Int32,
        1,
        &Initialization::Manual("37".into()),
    )
    .unwrap();
    dca
}

fn small_store(arrays: Vec<DataArray>) -> DataContainerArray {
    let mut dca = DataContainerArray::new();
    dca.create_data_container("DC").unwrap();
    let scope = DataArrayPath::new("DC", "AM", "");
    dca.create_attribute_matrix(&scope, AttributeMatrixType::Generic, vec![3])
        .unwrap();
    for array in arrays {
        let path = scope.with_array(array.name.clone());
        dca.insert_array(&path, array).unwrap();
    }
    dca
}

fn doubles(name: &str, values: Vec<f64>) -> DataArray {
    DataArray::new(name, 1, ArrayData::Double(values))
}

fn calc(expression: &str, output_type: ScalarType) -> ArrayCalculator {
    ArrayCalculator::new(
        DataArrayPath::new("DC", "AM", ""),
        expression,
        DataArrayPath::new("DC", "AM", "Out"),
        AngleUnit::Radians,
        output_type,
    )
}

fn output(dca: &DataContainerArray) -> Arc<DataArray> {
    dca.resolve(&DataArrayPath::new("DC", "AM", "Out")).unwrap()
}

#[test]
fn motivating_script_scenario() {
    let mut dca = image_store();
    let status = array_calculator(
        &mut dca,
        cell_scope(),
        "Int32Data*3.1415927*100",
        cell_scope().with_array("Output"),
        AngleUnit::Radians,
        ScalarType::UInt32,
    );
    assert_eq!(status.code, 0);
    assert!(status.messages.is_empty());

    let out = dca.resolve(&cell_scope().with_array("Output")).unwrap();
    assert_eq!(out.scalar_type(), ScalarType::UInt32);
    // 37 * 3.1415927 * 100 = 11623.89..., truncated.
    assert_eq!(out.data, ArrayData::UInt32(vec![11623; 120]));
}

#[test]
fn scaling_matches_elementwise_product() {
    let values = vec![-2.5, 0.0, 1e-3, 42.0, 7.25, -1e6];
    let mut dca = DataContainerArray::new();
    dca.create_data_container("DC").unwrap();
    let scope = DataArrayPath::new("DC", "AM", "");
    dca.create_attribute_matrix(&scope, AttributeMatrixType::Generic, vec![values.len()])
        .unwrap();
    dca.insert_array(&scope.with_array("a"), doubles("a", values.clone()))
        .unwrap();

    let report = calc("a * 1.75", ScalarType::Double).execute(&mut dca).unwrap();
    assert_eq!(report.num_tuples, values.len());
    let out = output(&dca).data.to_f64_vec();
    for (got, x) in out.iter().zip(&values) {
        assert!((got - x * 1.75).abs() < EPS);
    }
}

#[test]
fn length_mismatch_is_fatal_and_leaves_store_untouched() {
    let mut dca = small_store(vec![
        doubles("a", vec![1.0, 2.0, 3.0]),
        doubles("b", vec![1.0, 2.0, 3.0, 4.0]),
    ]);
    let before = dca.clone();

    let err = calc("a + b", ScalarType::Double).execute(&mut dca).unwrap_err();
    assert!(matches!(err, CalcError::LengthMismatch { expected: 3, found: 4, .. }));
    assert_eq!(err.code(), -4030);
    assert_eq!(dca, before);
}

#[test]
fn integer_output_truncates() {
    let mut dca = small_store(vec![]);
    let report = calc("7/2", ScalarType::Int32).execute(&mut dca).unwrap();
    assert_eq!(report.num_tuples, 3);
    assert_eq!(output(&dca).data, ArrayData::Int32(vec![3, 3, 3]));

    calc("-7/2", ScalarType::Int8).execute(&mut dca).unwrap();
    assert_eq!(output(&dca).data, ArrayData::Int8(vec![-3, -3, -3]));
}

#[test]
fn division_by_zero_substitutes_zero_and_warns() {
    let mut dca = small_store(vec![doubles("d", vec![2.0, 0.0, -4.0])]);
    let status = calc("1/d", ScalarType::Double).run(&mut dca);
    assert!(status.is_success());
    assert_eq!(status.messages, vec!["element 1: division by zero; stored 0".to_string()]);
    assert_eq!(output(&dca).data, ArrayData::Double(vec![0.5, 0.0, -0.25]));
}

#[test]
fn trig_respects_angle_unit() {
    let mut dca = small_store(vec![doubles("x", vec![90.0, 30.0, 0.0])]);
    let mut degrees = calc("sin(x)", ScalarType::Double);
    degrees.angle_unit = AngleUnit::Degrees;
    degrees.execute(&mut dca).unwrap();
    let out = output(&dca).data.to_f64_vec();
    assert!((out[0] - 1.0).abs() < EPS);
    assert!((out[1] - 0.5).abs() < EPS);
    assert!(out[2].abs() < EPS);

    let mut dca = small_store(vec![doubles("x", vec![std::f64::consts::FRAC_PI_2; 3])]);
    calc("sin(x)", ScalarType::Double).execute(&mut dca).unwrap();
    assert!(output(&dca).data.to_f64_vec().iter().all(|v| (v - 1.0).abs() < EPS));
}

#[test]
fn unknown_array_is_not_found_before_any_write() {
    let mut dca = small_store(vec![doubles("a", vec![1.0; 3])]);
    let before = dca.clone();
    let err = calc("a + Missing", ScalarType::Double).execute(&mut dca).unwrap_err();
    assert_eq!(
        err,
        CalcError::Store(StoreError::NotFound(DataArrayPath::new("DC", "AM", "Missing")))
    );
    assert_eq!(err.code(), -4020);
    assert_eq!(dca, before);
}

#[test]
fn parse_failures_report_negative_status() {
    let mut dca = small_store(vec![doubles("a", vec![1.0; 3])]);
    let before = dca.clone();
    for (expression, code) in [("", -4009), ("a +", -4010), ("(a", -4010), ("2a", -4011), ("foo(a)", -4012), ("pow(a)", -4013)] {
        let status = calc(expression, ScalarType::Double).run(&mut dca);
        assert_eq!(status.code, code, "expression {expression:?}");
        assert_eq!(status.messages.len(), 1);
    }
    assert_eq!(dca, before);
}

#[test]
fn deeply_nested_expression_is_a_syntax_error() {
    let mut dca = small_store(vec![doubles("a", vec![1.0; 3])]);
    let before = dca.clone();
    let nested = format!("{}a{}", "(".repeat(5000), ")".repeat(5000));
    let status = calc(&nested, ScalarType::Double).run(&mut dca);
    assert_eq!(status.code, -4010);
    assert!(status.messages[0].contains("nested too deeply"));
    assert_eq!(dca, before);
}

#[test]
fn output_is_replaced_not_duplicated() {
    let mut dca = small_store(vec![doubles("a", vec![1.0, 2.0, 3.0])]);
    calc("a", ScalarType::Int16).execute(&mut dca).unwrap();
    let first = output(&dca);
    calc("a * 10", ScalarType::Double).execute(&mut dca).unwrap();

    assert_eq!(first.data, ArrayData::Int16(vec![1, 2, 3]));
    assert_eq!(output(&dca).data, ArrayData::Double(vec![10.0, 20.0, 30.0]));
    assert_eq!(
        dca.list_array_names(&DataArrayPath::new("DC", "AM", "")).unwrap(),
        vec!["Out".to_string(), "a".to_string()]
    );
}

#[test]
fn output_may_reference_itself() {
    let mut dca = small_store(vec![doubles("Out", vec![1.0, 2.0, 3.0])]);
    calc("Out + 1", ScalarType::Double).execute(&mut dca).unwrap();
    assert_eq!(output(&dca).data, ArrayData::Double(vec![2.0, 3.0, 4.0]));
}

#[test]
fn missing_output_matrix_is_invalid_path() {
    let mut dca = small_store(vec![doubles("a", vec![1.0; 3])]);
    let before = dca.clone();
    let mut c = calc("a", ScalarType::Double);
    c.output_path = DataArrayPath::new("DC", "Nowhere", "Out");
    let err = c.execute(&mut dca).unwrap_err();
    assert!(matches!(err, CalcError::Store(StoreError::InvalidPath { .. })));
    assert_eq!(dca, before);
}

#[test]
fn out_of_range_values_are_clamped_with_warnings() {
    let mut dca = small_store(vec![doubles("a", vec![-5.0, 100.0, 1000.0])]);
    let report = calc("a", ScalarType::UInt8).execute(&mut dca).unwrap();
    assert_eq!(output(&dca).data, ArrayData::UInt8(vec![0, 100, 255]));
    assert_eq!(report.warnings.len(), 2);
    assert_eq!(report.warnings[0].index, 0);
    assert_eq!(report.warnings[1].kind, WarningKind::OutOfRange(ScalarType::UInt8));
    assert_eq!(report.warnings[1].substituted, 255.0);
}

#[test]
fn scalar_arrays_broadcast_and_components_select() {
    let mut dca = small_store(vec![
        doubles("k", vec![2.0]),
        DataArray::new(
            "Euler",
            3,
            ArrayData::Float(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]),
        ),
    ]);
    let report = calc("Euler * k", ScalarType::Float).execute(&mut dca).unwrap();
    assert_eq!((report.num_tuples, report.num_components), (3, 3));
    assert_eq!(output(&dca).num_components, 3);

    calc("Euler[2] - k", ScalarType::Double).execute(&mut dca).unwrap();
    assert_eq!(output(&dca).data, ArrayData::Double(vec![1.0, 4.0, 7.0]));
}

#[test]
fn scope_with_array_limits_visible_names() {
    let mut dca = small_store(vec![doubles("a", vec![1.0; 3]), doubles("b", vec![2.0; 3])]);
    let mut c = calc("a + b", ScalarType::Double);
    c.input_scope = DataArrayPath::new("DC", "AM", "a");
    assert!(matches!(
        c.execute(&mut dca),
        Err(CalcError::Store(StoreError::NotFound(path))) if path.array == "b"
    ));
    c.expression = "a * 3".into();
    c.execute(&mut dca).unwrap();
    assert_eq!(output(&dca).data, ArrayData::Double(vec![3.0; 3]));
}

#[test]
fn data_check_reports_shape_without_writing() {
    let dca = image_store();
    let c = ArrayCalculator::new(
        cell_scope(),
        "Int32Data / 2",
        cell_scope().with_array("Half"),
        AngleUnit::Degrees,
        ScalarType::Float,
    );
    assert_eq!(c.data_check(&dca).unwrap(), (120, 1));
    assert!(dca.resolve(&cell_scope().with_array("Half")).is_err());
}

#[test]
fn parameters_load_from_json() {
    let json = r#"{
        "input_scope": { "container": "ImageDataContainer", "matrix": "CellAttributeMatrix" },
        "expression": "Int32Data*3.1415927*100",
        "output_path": { "container": "ImageDataContainer", "matrix": "CellAttributeMatrix", "array": "Output" },
        "angle_unit": "Degrees",
        "output_type": "UInt32"
    }"#;
    let c: ArrayCalculator = serde_json::from_str(json).unwrap();
    assert_eq!(c.angle_unit, AngleUnit::Degrees);
    assert_eq!(c.output_type, ScalarType::UInt32);
    assert!(!c.input_scope.has_array());

    let mut dca = image_store();
    assert!(c.run(&mut dca).is_success());
}
