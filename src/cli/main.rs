//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Crymap.
//
// Crymap is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Crymap is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Crymap. If not, see <http://www.gnu.org/licenses/>.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use log::{error, info, LevelFilter};
use structopt::StructOpt;

use crate::message::{
    create_record, fetch_part, parse_binary_file, parse_file, IndexRecord,
};
use crate::mime::cache::CacheField;
use crate::mime::charset::StandardCharsets;
use crate::mime::model::Body;
use crate::mime::strict::copy_strict;
use crate::support::error::Error;
use crate::support::sysexits::*;
use crate::support::system_config::ParseConfig;

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
struct Options {
    /// A log4rs TOML configuration file. By default, messages at INFO and
    /// above are written to standard error.
    #[structopt(long, parse(from_os_str))]
    log_config: Option<PathBuf>,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
enum Command {
    /// Parse a message and show its structure and cache record.
    Parse {
        #[structopt(flatten)]
        common: CommonOptions,

        /// Re-encode binary parts as base64, rewriting the file in place.
        #[structopt(long)]
        binary: bool,
    },
    /// Check that a message is acceptable for delivery.
    ///
    /// Exits with status 0 if it is, or 65 (EX_DATAERR) if not.
    Validate(CommonOptions),
    /// Print the decoded text of the parts of a message with a given type.
    Fetch {
        #[structopt(flatten)]
        common: CommonOptions,

        /// The content type to look for, as TYPE or TYPE/SUBTYPE. Can be
        /// passed multiple times; "" matches any part.
        #[structopt(long = "type", number_of_values(1), default_value = "TEXT")]
        types: Vec<String>,
    },
}

#[derive(StructOpt)]
struct CommonOptions {
    /// The parse options, as a TOML file. All options have defaults.
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// The message file.
    #[structopt(parse(from_os_str))]
    file: PathBuf,
}

impl Command {
    fn common(&self) -> &CommonOptions {
        match *self {
            Command::Parse { ref common, .. }
            | Command::Fetch { ref common, .. } => common,
            Command::Validate(ref common) => common,
        }
    }
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let options =
        Options::from_clap(&match Options::clap().get_matches_safe() {
            Ok(matches) => matches,
            Err(
                e @ clap::Error {
                    kind: clap::ErrorKind::HelpDisplayed,
                    ..
                },
            )
            | Err(
                e @ clap::Error {
                    kind: clap::ErrorKind::VersionDisplayed,
                    ..
                },
            ) => {
                println!("{}", e.message);
                return;
            }
            Err(e) => {
                eprintln!("{}", e.message);
                EX_USAGE.exit()
            }
        });

    init_log(options.log_config.as_deref());

    let common = options.command.common();
    let config = load_config(common.config.as_deref());
    let file = &common.file;

    let result = match options.command {
        Command::Parse { binary, .. } => parse(file, &config, binary),
        Command::Validate(..) => validate(file, &config),
        Command::Fetch { ref types, .. } => fetch(file, &config, types),
    };

    if let Err(e) = result {
        error!("{}: {}", file.display(), e);
        Sysexit::for_error(&e).exit();
    }
}

fn init_log(log_config: Option<&Path>) {
    if let Some(path) = log_config {
        if let Err(e) =
            log4rs::init_file(path, log4rs::file::Deserializers::new())
        {
            eprintln!("Error in log config '{}': {}", path.display(), e);
            EX_CONFIG.exit();
        }
        return;
    }

    use log4rs::append::console::{ConsoleAppender, Target};
    use log4rs::config::{Appender, Config, Root};
    use log4rs::encode::pattern::PatternEncoder;

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(
            "{d(%H:%M:%S%.3f)} [{l}][{t}] {m}{n}",
        )))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(LevelFilter::Info));

    match config {
        Ok(config) => {
            // Only fails if a logger is already installed
            let _ = log4rs::init_config(config);
        }
        Err(e) => {
            eprintln!("Failed to set up logging: {}", e);
            EX_SOFTWARE.exit();
        }
    }
}

fn load_config(path: Option<&Path>) -> ParseConfig {
    let path = match path {
        Some(path) => path,
        None => return ParseConfig::default(),
    };

    let mut data = Vec::new();
    if let Err(e) =
        fs::File::open(path).and_then(|mut f| f.read_to_end(&mut data))
    {
        eprintln!("Error reading '{}': {}", path.display(), e);
        EX_CONFIG.exit();
    }

    match ParseConfig::from_toml(&data) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error in config file at '{}': {}", path.display(), e);
            EX_CONFIG.exit()
        }
    }
}

fn parse(file: &Path, config: &ParseConfig, binary: bool) -> Result<(), Error> {
    let body = if binary {
        let mut f = fs::OpenOptions::new().read(true).write(true).open(file)?;
        parse_binary_file(&mut f, config, &StandardCharsets)?
    } else {
        parse_file(file, config, &StandardCharsets)?.1
    };

    info!("Parsed {}", file.display());
    print_tree(&body, "1", 0);

    let mut record = IndexRecord::default();
    create_record(&mut record, &body, config, &StandardCharsets);

    println!();
    println!("size:          {}", record.size);
    println!("header size:   {}", record.header_size);
    println!("content lines: {}", record.content_lines);
    println!("guid:          {}", hex(&record.guid));
    println!("flags:         {:?}", record.system_flags);
    if let Some(sentdate) = record.sentdate {
        println!("sent date:     {}", sentdate);
    }
    if let Some(gmtime) = record.gmtime {
        println!("date:          {}", gmtime.to_rfc3339());
    }
    if let Some(internaldate) = record.internaldate {
        println!("internal date: {}", internaldate.to_rfc3339());
    }
    println!(
        "cache:         {} bytes, version {}, crc {:08x}",
        record.cache.data.len(),
        record.cache.version,
        record.cache.crc
    );
    for &(name, field) in &[
        ("envelope", CacheField::Envelope),
        ("body", CacheField::Body),
        ("from", CacheField::From),
        ("to", CacheField::To),
        ("cc", CacheField::Cc),
        ("bcc", CacheField::Bcc),
        ("subject", CacheField::Subject),
    ] {
        println!(
            "  {:9} {}",
            name,
            String::from_utf8_lossy(record.cache.item(field))
        );
    }

    Ok(())
}

fn print_tree(body: &Body, section: &str, depth: usize) {
    println!(
        "{:indent$}{} {}/{} header {}+{} content {}+{} lines {}",
        "",
        section,
        body.typ,
        body.subtype,
        body.header_offset,
        body.header_size,
        body.content_offset,
        body.content_size,
        body.content_lines,
        indent = depth * 2
    );

    for (ix, part) in body.parts.iter().enumerate() {
        print_tree(part, &format!("{}.{}", section, ix + 1), depth + 1);
    }
    if let Some(ref sub) = body.subpart {
        print_tree(sub, &format!("{}.1", section), depth + 1);
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn validate(file: &Path, config: &ParseConfig) -> Result<(), Error> {
    let f = fs::File::open(file)?;
    let size = f.metadata()?.len();
    copy_strict(f, io::sink(), size, false, config.eight_bit_headers)?;
    println!("{}: OK", file.display());
    Ok(())
}

fn fetch(
    file: &Path,
    config: &ParseConfig,
    types: &[String],
) -> Result<(), Error> {
    let (data, mut body) = parse_file(file, config, &StandardCharsets)?;
    let types = types.iter().map(String::as_str).collect::<Vec<_>>();
    for part in fetch_part(&data, &mut body, &types, &StandardCharsets)? {
        println!("--- {}", part.section);
        println!("{}", part.decoded_body);
    }
    Ok(())
}
