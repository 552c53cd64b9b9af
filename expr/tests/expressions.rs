// Copyright (c) James Kassemi, SC, US. All rights reserved.
use expr::{CompiledExpr, ExprError, FieldSchema, Value, compile};

fn approx_eq(a: f64, b: f64, tol: f64) {
    assert!((a - b).abs() <= tol, "expected {a} ~= {b} within {tol}");
}

fn columns() -> FieldSchema {
    FieldSchema::for_columns(&["time", "p", "T", "mu_rate", "n_rate"])
}

#[test]
fn derived_column_over_many_rows() -> Result<(), ExprError> {
    let expr = compile("T - 273.15", &columns())?;
    let rows = [
        [0.0, 1013.0, 273.15, 1.0, 2.0],
        [1.0, 1012.0, 283.15, 1.0, 2.0],
        [2.0, 1011.0, 300.0, 1.0, 2.0],
    ];
    let out: Vec<f64> = rows
        .iter()
        .map(|row| expr.eval_f64(row).unwrap())
        .collect();
    approx_eq(out[0], 0.0, 1e-12);
    approx_eq(out[1], 10.0, 1e-12);
    approx_eq(out[2], 26.85, 1e-9);
    Ok(())
}

#[test]
fn whitelisted_functions_and_constants() -> Result<(), ExprError> {
    let schema = columns();
    let row = [0.0, 100.0, 0.0, 3.0, 4.0];
    approx_eq(compile("hypot(mu_rate, n_rate)", &schema)?.eval_f64(&row).unwrap(), 5.0, 1e-12);
    approx_eq(compile("sqrt(p) / 10", &schema)?.eval_f64(&row).unwrap(), 1.0, 1e-12);
    approx_eq(compile("cos(pi)", &schema)?.eval_f64(&row).unwrap(), -1.0, 1e-12);
    approx_eq(compile("arctan2(1, 1) * 4", &schema)?.eval_f64(&row).unwrap(), std::f64::consts::PI, 1e-12);
    assert_eq!(compile("isnan(nan)", &schema)?.eval(&row).unwrap(), Value::Bool(true));
    Ok(())
}

#[test]
fn ieee_division_and_nan_truthiness() -> Result<(), ExprError> {
    let schema = columns();
    let row = [0.0, 0.0, 0.0, 1.0, 0.0];
    assert_eq!(compile("mu_rate / n_rate", &schema)?.eval_f64(&row).unwrap(), f64::INFINITY);
    assert!(compile("n_rate / n_rate", &schema)?.eval_f64(&row).unwrap().is_nan());
    // NaN is truthy, so a cut written as a bare value keeps the row
    assert!(compile("nan", &schema)?.eval_bool(&row).unwrap());
    assert!(!compile("not nan", &schema)?.eval_bool(&row).unwrap());
    Ok(())
}

#[test]
fn bitwise_operators_combine_cuts() -> Result<(), ExprError> {
    let schema = columns();
    let expr = compile("(p > 1000) & ~(T < 0) | (time == 5)", &schema)?;
    assert!(expr.eval_bool(&[0.0, 1001.0, 1.0, 0.0, 0.0]).unwrap());
    assert!(!expr.eval_bool(&[0.0, 1001.0, -1.0, 0.0, 0.0]).unwrap());
    assert!(expr.eval_bool(&[5.0, 0.0, -1.0, 0.0, 0.0]).unwrap());
    Ok(())
}

#[test]
fn averaged_schema_exposes_synthetic_fields() -> Result<(), ExprError> {
    let schema = FieldSchema::for_averaged(&["time", "p", "T", "mu_rate", "n_rate"]);
    let expr = compile("mu_rate * count / weight + rate", &schema)?;
    let row = [15.0, 1000.0, 280.0, 2.0, 0.0, 30.0, 2.0, 1.0];
    approx_eq(expr.eval_f64(&row).unwrap(), 31.0, 1e-12);
    assert_eq!(expr.fields(), &["mu_rate", "count", "weight", "rate"]);
    Ok(())
}

#[test]
fn rejected_inputs_carry_the_expression() {
    let err = compile("  os.system(1)", &columns()).unwrap_err();
    assert!(matches!(err, ExprError::Unsafe { .. }));
    assert_eq!(err.expression(), "os.system(1)");

    let err = compile("p >", &columns()).unwrap_err();
    assert!(matches!(err, ExprError::Syntax { .. }));
}

#[test]
fn constant_weight_needs_no_fields() {
    let weight = CompiledExpr::constant(1.0);
    assert!(weight.is_constant());
    assert_eq!(weight.eval_f64(&[]).unwrap(), 1.0);
}
