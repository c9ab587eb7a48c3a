// Command line utility for compressing and inspecting ivsparse matrices

use anyhow::{Context, Error};
use clap::{value_parser, Arg, Command};
use ivsparse::{read_header, Format};
use std::path::PathBuf;
use tools::mtx::load_mtx;

pub fn main() -> Result<(), Error> {
    let matches = Command::new("ivsparse-cmd")
        .subcommand_required(true)
        .subcommand(
            Command::new("compress")
                .about("Compress an MTX file")
                .arg(
                    Arg::new("INPUT")
                        .help("mtx file to use, optionally gzipped")
                        .required(true)
                        .index(1)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("FORMAT")
                        .help("Storage format")
                        .short('f')
                        .long("format")
                        .default_value("ivcsc")
                        .value_parser(["csc", "vcsc", "ivcsc"]),
                )
                .arg(
                    Arg::new("OUT")
                        .help("Output file")
                        .short('o')
                        .long("out")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("info").about("Print the header of a matrix file").arg(
                Arg::new("FILE")
                    .help("matrix file")
                    .required(true)
                    .index(1)
                    .value_parser(value_parser!(PathBuf)),
            ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("compress", sub)) => {
            let input = sub.get_one::<PathBuf>("INPUT").context("missing INPUT")?;
            let out = sub.get_one::<PathBuf>("OUT").context("missing OUT")?;
            let format: Format = sub.get_one::<String>("FORMAT").context("missing FORMAT")?.parse()?;

            let matrix = load_mtx(input, format)?;
            matrix.write(out).with_context(|| out.display().to_string())?;

            let plain = if format == Format::PlainCsc {
                matrix.byte_size()
            } else {
                matrix.to_format(Format::PlainCsc).byte_size()
            };
            println!("rows:\t{}", matrix.rows());
            println!("cols:\t{}", matrix.cols());
            println!("nnz:\t{}", matrix.nnz());
            println!(
                "bytes:\t{} ({format}), {} (csc), ratio {:.3}",
                matrix.byte_size(),
                plain,
                matrix.byte_size() as f64 / plain as f64
            );
        }
        Some(("info", sub)) => {
            let file = sub.get_one::<PathBuf>("FILE").context("missing FILE")?;
            let header = read_header(file).with_context(|| file.display().to_string())?;
            let format = header
                .format()
                .map(|f| f.to_string())
                .unwrap_or_else(|| format!("unknown ({})", header.format_tag));
            let value_type = header.value_type;

            println!("format:\t{format}");
            println!("inner:\t{}", header.inner_dim);
            println!("outer:\t{}", header.outer_dim);
            println!("nnz:\t{}", header.nnz);
            println!(
                "value:\t{} bytes, float {}, signed {}, {:?}",
                value_type.value_size(),
                value_type.is_float(),
                value_type.is_signed(),
                value_type.storage()
            );
            println!("index:\t{} bytes", header.index_width);
        }
        _ => unreachable!("a subcommand is required"),
    }

    Ok(())
}
