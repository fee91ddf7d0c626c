//! Print and validate composed annotation programs.
//!
//! ```text
//! impostor-shaders <sphere|ellipsoid|cone> [rank] [property...]
//! impostor-shaders --all
//! impostor-shaders --schema
//! ```

use std::{
    collections::BTreeSet,
    io::{self, Write},
    process::ExitCode,
};

use quadric_annotations::{
    annotation::PropertyId, options::Options, shader::CompiledProgram,
    AnnotationError, CompositionKey, ProgramCache, ShapeKind,
};

enum Command {
    Print(CompositionKey),
    ValidateAll,
    Schema,
}

fn usage() -> String {
    let shapes: Vec<_> = ShapeKind::ALL.iter().map(|s| s.name()).collect();
    let properties: Vec<_> = PropertyId::ALL.iter().map(|p| p.name()).collect();
    format!(
        "usage: impostor-shaders <{}> [rank] [property...]\n       \
         impostor-shaders --all | --schema\nproperties: {}",
        shapes.join("|"),
        properties.join(", ")
    )
}

fn parse(args: &[String]) -> Result<Command, String> {
    let Some(first) = args.first() else {
        return Err(usage());
    };
    match first.as_str() {
        "--all" => return Ok(Command::ValidateAll),
        "--schema" => return Ok(Command::Schema),
        _ => {}
    }
    let shape = ShapeKind::ALL
        .into_iter()
        .find(|s| s.name() == first)
        .ok_or_else(|| format!("unknown shape '{first}'\n{}", usage()))?;

    let mut rest = args[1..].iter().peekable();
    let rank = match rest.peek().map(|a| a.parse::<u32>()) {
        Some(Ok(rank)) => {
            let _ = rest.next();
            rank
        }
        _ => 3,
    };
    let mut referenced = BTreeSet::new();
    for name in rest {
        let property = PropertyId::from_name(name)
            .ok_or_else(|| format!("unknown property '{name}'\n{}", usage()))?;
        if property.shape() != shape {
            log::warn!("{name} does not apply to {shape}; ignored");
        }
        let _ = referenced.insert(property);
    }
    CompositionKey::new(shape, rank, &referenced)
        .map(Command::Print)
        .map_err(|e| e.to_string())
}

fn validate(program: &CompiledProgram) -> Result<(), AnnotationError> {
    let _ = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(program.module())
    .map_err(|e| {
        AnnotationError::ShaderCompose(format!("{}: {e:?}", program.key()))
    })?;
    Ok(())
}

/// Every shape at every rank, with no properties and with all of them.
fn all_keys() -> Result<Vec<CompositionKey>, AnnotationError> {
    let every: BTreeSet<_> = PropertyId::ALL.into_iter().collect();
    let mut keys = Vec::new();
    for shape in ShapeKind::ALL {
        for rank in 1..=3 {
            keys.push(CompositionKey::new(shape, rank, &BTreeSet::new())?);
            keys.push(CompositionKey::new(shape, rank, &every)?);
        }
    }
    Ok(keys)
}

fn run(command: Command, out: &mut impl Write) -> Result<(), AnnotationError> {
    match command {
        Command::Schema => {
            let schema = serde_json::to_string_pretty(&Options::json_schema())
                .map_err(|e| AnnotationError::OptionsParse(e.to_string()))?;
            writeln!(out, "{schema}")?;
        }
        Command::Print(key) => {
            let mut cache = ProgramCache::new()?;
            let program = cache.get_or_compose(&key)?;
            validate(program)?;
            writeln!(out, "// {key}")?;
            writeln!(out, "{}", program.source())?;
        }
        Command::ValidateAll => {
            let mut cache = ProgramCache::new()?;
            for key in all_keys()? {
                let program = cache.get_or_compose(&key)?;
                validate(program)?;
                writeln!(
                    out,
                    "{key}: ok ({} uniform bytes)",
                    program.layout().uniform_size
                )?;
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse(&args) {
        Ok(command) => command,
        Err(message) => {
            log::error!("{message}");
            return ExitCode::from(2);
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match run(command, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
