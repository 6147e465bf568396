//! array-calc CLI
//!
//! Usage:
//!   array-calc -i store.json --scope DC/AM -e "Int32Data*3.1415927*100" -o DC/AM/Output --type uint32
//!   array-calc -i cells.parquet --scope DC/Cells -e "sqrt(x*x + y*y)" -o DC/Cells/r -w out.csv
//!   array-calc -i store.json -c calc.json -w result.json

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use arrow::util::pretty::pretty_format_batches;
use clap::Parser;

use array_calc::data::loader::{load_matrix, load_store, matrix_to_record_batch, write_file};
use array_calc::{AngleUnit, ArrayCalculator, DataArrayPath, DataContainerArray, ScalarType};

#[derive(Parser, Debug)]
#[command(name = "array-calc")]
#[command(version)]
#[command(about = "Evaluate an expression element-wise over attribute arrays", long_about = None)]
struct Args {
    /// Input: a .json store, or a .csv/.parquet attribute matrix
    #[arg(short, long)]
    input: PathBuf,

    /// JSON file with calculator parameters
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input scope, container/matrix[/array]
    #[arg(long)]
    scope: Option<DataArrayPath>,

    /// Expression to evaluate
    #[arg(short, long)]
    expression: Option<String>,

    /// Output array, container/matrix/name
    #[arg(short, long)]
    output: Option<DataArrayPath>,

    /// Angle unit for trigonometric functions (degrees | radians)
    #[arg(long)]
    angle: Option<AngleUnit>,

    /// Output element type (int8 … uint64, float, double, bool)
    #[arg(long = "type")]
    output_type: Option<ScalarType>,

    /// Write the result to a .json, .csv or .parquet file
    #[arg(short, long)]
    write: Option<PathBuf>,

    /// Print the output matrix
    #[arg(long)]
    show: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let calc = calculator(&args)?;
    let mut store = open_input(&args, &calc)?;

    let status = calc.run(&mut store);
    for message in &status.messages {
        if status.is_success() {
            eprintln!("warning: {message}");
        } else {
            eprintln!("error: {message}");
        }
    }
    if !status.is_success() {
        bail!("array calculator failed with status {}", status.code);
    }
    println!("status {}", status.code);

    if args.show {
        let am = store.attribute_matrix(&calc.output_path)?;
        let batch = matrix_to_record_batch(am)?;
        println!("{}", pretty_format_batches(&[batch])?);
    }

    if let Some(path) = &args.write {
        write_file(path, &store, Some(&calc.output_path))
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

/// Parameters from `--config`, overridden by individual flags.
fn calculator(args: &Args) -> Result<ArrayCalculator> {
    let mut calc = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<ArrayCalculator>(&text).context("parsing calculator config")?
        }
        None => ArrayCalculator::new(
            args.scope.clone().context("--scope is required without --config")?,
            args.expression
                .clone()
                .context("--expression is required without --config")?,
            args.output.clone().context("--output is required without --config")?,
            AngleUnit::default(),
            ScalarType::Double,
        ),
    };
    if let Some(scope) = &args.scope {
        calc.input_scope = scope.clone();
    }
    if let Some(expression) = &args.expression {
        calc.expression = expression.clone();
    }
    if let Some(output) = &args.output {
        calc.output_path = output.clone();
    }
    if let Some(angle) = args.angle {
        calc.angle_unit = angle;
    }
    if let Some(ty) = args.output_type {
        calc.output_type = ty;
    }
    Ok(calc)
}

/// Load the input file. A tabular file becomes the single matrix named by
/// the input scope.
fn open_input(args: &Args, calc: &ArrayCalculator) -> Result<DataContainerArray> {
    let ext = args
        .input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    if ext == "json" {
        return load_store(&args.input);
    }

    let scope = &calc.input_scope;
    let matrix = load_matrix(&args.input, &scope.matrix)
        .with_context(|| format!("loading {}", args.input.display()))?;
    let mut store = DataContainerArray::new();
    store.create_data_container(&scope.container)?;
    store.insert_attribute_matrix(&scope.container, matrix)?;
    Ok(store)
}
