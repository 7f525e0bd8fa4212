use clap::Parser as ClapParser;
use std::{error::Error, process, sync::Arc};

use experij::{
    AccessFlags, Collaborator, Descriptor, EmitterSettings, EntryPointEmitter,
    ExperimentSetBuilder, LogObserver, MethodAssembler,
};

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Internal name of the class owning the methods
    #[arg(long, help = "Owning class, e.g. demo/Calc")]
    class: String,

    /// Experiment name
    #[arg(long, help = "Experiment name")]
    experiment: String,

    /// Control method as `name(descriptor)`
    #[arg(long, help = "Control method, e.g. 'sum(ID)I'")]
    control: String,

    /// Experiment methods as `name(descriptor)`
    #[arg(long = "variant", help = "Experiment method, repeatable")]
    variants: Vec<String>,

    /// Members are static methods
    #[arg(long = "static", help = "Members are static methods")]
    is_static: bool,

    /// Also emit a public delegate named after the control
    #[arg(long, help = "Emit a delegate replacing the control method")]
    delegate: bool,

    #[arg(long, help = "Entry point name template")]
    entry_format: Option<String>,

    #[arg(long, help = "Renamed method name template")]
    rename_format: Option<String>,

    /// Owner of the `equals` and `report` routines
    #[arg(long, help = "Class holding the equality and report routines")]
    runtime_owner: Option<String>,

    /// Increase log verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn settings(&self) -> EmitterSettings {
        let mut settings = EmitterSettings::default();
        if let Some(format) = &self.entry_format {
            settings.entry_point_format = format.clone();
        }
        if let Some(format) = &self.rename_format {
            settings.renamed_method_format = format.clone();
        }
        if let Some(owner) = &self.runtime_owner {
            settings.equality = Collaborator::new(owner.as_str(), settings.equality.name.clone());
            settings.reporter = Collaborator::new(owner.as_str(), settings.reporter.name.clone());
        }
        settings
    }
}

/// Split `name(descriptor)` at the first parenthesis.
fn split_method(text: &str) -> Result<(&str, Descriptor), Box<dyn Error>> {
    let Some(open) = text.find('(') else {
        return Err(format!("expected `name(descriptor)`, got `{text}`").into());
    };
    let (name, descriptor) = text.split_at(open);
    if name.is_empty() {
        return Err(format!("missing method name in `{text}`").into());
    }
    Ok((name, Descriptor::parse(descriptor)?))
}

fn run(cli: &Cli) -> Result<String, Box<dyn Error>> {
    let settings = cli.settings();
    let mut builder = ExperimentSetBuilder::new(cli.class.as_str(), cli.experiment.as_str())?
        .with_observer(Arc::new(LogObserver));

    let (control, descriptor) = split_method(&cli.control)?;
    builder.register(control, descriptor, true, cli.is_static)?;
    for variant in &cli.variants {
        let (name, descriptor) = split_method(variant)?;
        builder.register(name, descriptor, false, cli.is_static)?;
    }
    let set = builder.finish()?;

    let emitter = EntryPointEmitter::new(&set, &settings);
    let mut asm = MethodAssembler::new();
    emitter.emit(&mut asm)?;
    if cli.delegate {
        emitter.emit_delegate(&mut asm, AccessFlags::PUBLIC, set.control())?;
    }
    let assembly = asm.finish()?;

    let mut out = String::new();
    for method in &assembly.methods {
        out.push_str(&assembly.disassemble(method)?);
        out.push('\n');
    }
    out.push_str(&format!(
        "constant pool: {} entries, {} bytes\n",
        assembly.pool.len(),
        assembly.pool.encode().len()
    ));
    Ok(out)
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&cli) {
        Ok(listing) => print!("{listing}"),
        Err(err) => {
            eprintln!("Error emitting experiment '{}': {}", cli.experiment, err);
            process::exit(1);
        }
    }
}
