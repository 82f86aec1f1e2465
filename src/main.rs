use std::path::PathBuf;

use svg2dxf::{MappingResolver, Pipeline};

pub const HELP: &str = "svg2dxf

USAGE:
    svg2dxf [OPTIONS] INPUT [OUTPUT]

OPTIONS:
    -h, --help\t\tPrint this message
    -v, --verbose\t\tPrint one line per written entity
    --css FILE\t\tApply an external style sheet (repeatable)
    --mapping FILE\tLoad a JSON mapping configuration

OUTPUT defaults to INPUT with a .dxf extension.
Set RUST_LOG=debug for detailed logging.";

fn main() {
    fn inner() -> Result<(), Box<dyn std::error::Error>> {
        env_logger::init();

        let mut verbose = false;
        let mut stylesheets = Vec::new();
        let mut mapping = None;
        let mut positional = Vec::new();

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => {
                    println!("{}", HELP);
                    return Ok(());
                }
                "-v" | "--verbose" => verbose = true,
                "--css" => match args.next() {
                    Some(path) => stylesheets.push(PathBuf::from(path)),
                    None => return Err("--css needs a file argument".into()),
                },
                "--mapping" => match args.next() {
                    Some(path) => mapping = Some(PathBuf::from(path)),
                    None => return Err("--mapping needs a file argument".into()),
                },
                _ => positional.push(PathBuf::from(arg)),
            }
        }

        let (input, output) = match positional.as_slice() {
            [input] => (input.clone(), input.with_extension("dxf")),
            [input, output] => (input.clone(), output.clone()),
            _ => return Err(format!("Expected INPUT [OUTPUT]\n\n{}", HELP).into()),
        };

        let mut pipeline = Pipeline::new(MappingResolver::with_defaults());
        for stylesheet in &stylesheets {
            pipeline.add_stylesheet_file(stylesheet)?;
        }
        if let Some(mapping) = &mapping {
            pipeline.load_config(mapping)?;
        }

        let (document, summary) = pipeline.load_with_summary(&input)?;
        println!("{}", summary);
        for warning in &summary.warnings {
            eprintln!("{}", warning);
        }

        let result = pipeline.convert(&document, &output)?;
        if verbose {
            for line in &result.log_messages {
                println!("{}", line);
            }
        }
        println!("{}", result);
        for warning in &result.warnings {
            eprintln!("{}", warning);
        }

        Ok(())
    }

    if let Err(e) = inner() {
        eprintln!("{}", e);
        std::process::exit(2);
    }
}
