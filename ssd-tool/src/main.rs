use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use prettytable::{cell, row, Table};
use serde::Serialize;
use ssd_dl::{bbox::prelude::*, config::Config, dbox::GridIndex, model::SsdModel};
use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Parser)]
enum Opts {
    /// Print the default box layout of a model.
    Info {
        /// configuration file
        config_file: PathBuf,
    },
    /// Write every default box to a JSON file.
    DumpBoxes {
        /// configuration file
        config_file: PathBuf,
        /// output JSON file
        output_file: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct DefaultBoxRecord<'a> {
    index: usize,
    map: &'a str,
    row: usize,
    col: usize,
    variant: usize,
    cxcywh: [f32; 4],
    xyxy: [f32; 4],
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    match Opts::parse() {
        Opts::Info { config_file } => {
            info(config_file)?;
        }
        Opts::DumpBoxes {
            config_file,
            output_file,
        } => {
            dump_boxes(config_file, output_file)?;
        }
    }

    Ok(())
}

fn load_model(config_file: impl AsRef<Path>) -> Result<SsdModel> {
    let config = Config::open(config_file)?;
    config.model_init().build()
}

fn info(config_file: impl AsRef<Path>) -> Result<()> {
    let model = load_model(config_file)?;
    let dboxes = model.dboxes();

    // print feature map information
    {
        let mut table = Table::new();
        table.add_row(row!["name", "size", "boxes per cell", "offset", "boxes"]);

        dboxes
            .names()
            .iter()
            .zip(dboxes.layout().maps())
            .for_each(|(name, map)| {
                table.add_row(row![
                    name,
                    format!("{}x{}", map.h(), map.w()),
                    map.variants(),
                    map.offset(),
                    map.num_boxes(),
                ]);
            });

        table.printstd();
    }

    let class_space = model.class_space();
    println!(
        "{} default boxes, {} logits ({:?}), {} object classes",
        dboxes.len(),
        class_space.class_nums(),
        class_space.layout(),
        class_space.num_objects()
    );

    Ok(())
}

fn dump_boxes(config_file: impl AsRef<Path>, output_file: impl AsRef<Path>) -> Result<()> {
    let output_file = output_file.as_ref();
    let model = load_model(config_file)?;
    let dboxes = model.dboxes();

    let records: Vec<_> = dboxes
        .layout()
        .iter()
        .zip(dboxes.boxes())
        .enumerate()
        .map(|(index, (grid_index, dbox))| {
            let GridIndex {
                map,
                row,
                col,
                variant,
            } = grid_index;
            DefaultBoxRecord {
                index,
                map: &dboxes.names()[map],
                row,
                col,
                variant,
                cxcywh: dbox.cxcywh(),
                xyxy: dbox.xyxy(),
            }
        })
        .collect();

    let writer = BufWriter::new(
        File::create(output_file)
            .with_context(|| format!("unable to create '{}'", output_file.display()))?,
    );
    serde_json::to_writer_pretty(writer, &records)?;
    info!("wrote {} default boxes to '{}'", records.len(), output_file.display());

    Ok(())
}
