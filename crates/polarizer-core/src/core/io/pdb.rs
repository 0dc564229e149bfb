use crate::core::io::codec::{self, CodecError, RESIDUE_SEQ_WIDTH, SERIAL_WIDTH};
use crate::core::io::traits::ModelFile;
use crate::core::models::particle::{Particle, ParticleError};
use crate::core::models::topology::{Bond, Cell, CrossResidueBondPolicy, Topology, TopologyError};
use crate::core::utils::identifiers::element_from_name;
use nalgebra::Point3;
use std::collections::{BTreeMap, HashMap};
use std::io::{self, BufRead, Write};
use thiserror::Error;
use tracing::debug;

const ANGLE_TOLERANCE_DEG: f64 = 1e-3;
const MIN_ATOM_RECORD_LEN: usize = 54;
const CONECT_FIELD_WIDTH: usize = 5;
const CONECT_PARTNERS_PER_RECORD: usize = 4;

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: PdbParseErrorKind,
    },
    #[error("Missing required record: {0}")]
    MissingRecord(String),
    #[error(
        "Unsupported non-orthogonal cell (alpha={alpha}, beta={beta}, gamma={gamma}); only orthorhombic cells are supported"
    )]
    NonOrthogonalCell { alpha: f64, beta: f64, gamma: f64 },
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error("Value '{token}' does not fit the {field} field")]
    FieldOverflow { field: &'static str, token: String },
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid index in columns {columns}: {source}")]
    InvalidIndex {
        columns: &'static str,
        source: CodecError,
    },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat {
        columns: &'static str,
        value: String,
    },
    #[error("Invalid particle record: {0}")]
    InvalidParticle(ParticleError),
    #[error("Line is too short for an ATOM/HETATM record (must be at least 54 chars)")]
    LineTooShort,
}

/// Options controlling how a PDB file is turned into a [`Topology`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PdbReadOptions {
    pub bond_policy: CrossResidueBondPolicy,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

fn parse_index(line: &str, line_num: usize, start: usize, end: usize, width: usize, columns: &'static str) -> Result<usize, PdbError> {
    codec::decode(slice_and_trim(line, start, end), width).map_err(|source| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidIndex { columns, source },
    })
}

fn parse_float(line: &str, line_num: usize, start: usize, end: usize, columns: &'static str) -> Result<f64, PdbError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidFloat {
            columns,
            value: value.to_string(),
        },
    })
}

fn parse_angle(line: &str, line_num: usize, start: usize, end: usize, columns: &'static str) -> Result<f64, PdbError> {
    if slice_and_trim(line, start, end).is_empty() {
        return Ok(90.0);
    }
    parse_float(line, line_num, start, end, columns)
}

fn parse_cell(line: &str, line_num: usize) -> Result<Cell, PdbError> {
    let a = parse_float(line, line_num, 6, 15, "7-15")?;
    let b = parse_float(line, line_num, 15, 24, "16-24")?;
    let c = parse_float(line, line_num, 24, 33, "25-33")?;
    let alpha = parse_angle(line, line_num, 33, 40, "34-40")?;
    let beta = parse_angle(line, line_num, 40, 47, "41-47")?;
    let gamma = parse_angle(line, line_num, 47, 54, "48-54")?;

    let orthogonal = [alpha, beta, gamma]
        .iter()
        .all(|angle| (angle - 90.0).abs() <= ANGLE_TOLERANCE_DEG);
    if !orthogonal {
        return Err(PdbError::NonOrthogonalCell { alpha, beta, gamma });
    }
    Ok(Cell::new(a, b, c))
}

fn parse_particle(line: &str, line_num: usize, serial: usize) -> Result<Particle, PdbError> {
    if line.len() < MIN_ATOM_RECORD_LEN {
        return Err(PdbError::Parse {
            line: line_num,
            kind: PdbParseErrorKind::LineTooShort,
        });
    }

    let name = slice_and_trim(line, 12, 16);
    let residue_name = slice_and_trim(line, 17, 20);
    let residue_seq = parse_index(line, line_num, 22, 26, RESIDUE_SEQ_WIDTH, "23-26")?;
    let x = parse_float(line, line_num, 30, 38, "31-38")?;
    let y = parse_float(line, line_num, 38, 46, "39-46")?;
    let z = parse_float(line, line_num, 46, 54, "47-54")?;

    let element = match slice_and_trim(line, 76, 78) {
        "" => {
            let guessed = element_from_name(name);
            debug!(
                "Line {}: no element column, guessed '{}' from name '{}'",
                line_num, guessed, name
            );
            guessed
        }
        symbol => symbol.to_string(),
    };

    Particle::new(serial, name, residue_name, residue_seq, Point3::new(x, y, z), &element).map_err(
        |e| PdbError::Parse {
            line: line_num,
            kind: PdbParseErrorKind::InvalidParticle(e),
        },
    )
}

/// Formats an atom name for columns 13-16, following the convention that names of
/// one-letter elements start in column 14.
fn format_atom_name(name: &str, element: &str) -> String {
    let starts_alpha = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    if name.len() < 4 && starts_alpha && element.len() < 2 {
        format!(" {}", name)
    } else {
        name.to_string()
    }
}

fn fixed_field(value: usize, width: usize, field: &'static str) -> Result<String, PdbError> {
    let token = codec::encode(value, width);
    if token.len() > width {
        return Err(PdbError::FieldOverflow { field, token });
    }
    Ok(token)
}

pub struct PdbFile;

impl ModelFile for PdbFile {
    type Model = Topology;
    type ReadOptions = PdbReadOptions;
    type Error = PdbError;

    fn read_from(
        reader: &mut impl BufRead,
        options: &Self::ReadOptions,
    ) -> Result<Topology, Self::Error> {
        let mut header_lines = Vec::new();
        let mut cell = None;
        let mut particles: Vec<Particle> = Vec::new();
        let mut serial_map: HashMap<usize, usize> = HashMap::new();
        let mut raw_bonds: Vec<(usize, usize, usize)> = Vec::new();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;

            let record_type = slice_and_trim(&line, 0, 6);
            match record_type {
                "CRYST1" => cell = Some(parse_cell(&line, line_num)?),
                "ATOM" | "HETATM" => {
                    let file_serial =
                        parse_index(&line, line_num, 6, 11, SERIAL_WIDTH, "7-11")?;
                    let serial = particles.len() + 1;
                    if serial_map.insert(file_serial, serial).is_some() {
                        return Err(PdbError::Inconsistency(format!(
                            "Duplicate atom serial {} on line {}",
                            file_serial, line_num
                        )));
                    }
                    particles.push(parse_particle(&line, line_num, serial)?);
                }
                "CONECT" => {
                    let mut fields = Vec::new();
                    let mut start = 6;
                    while start < line.len() {
                        let end = start + CONECT_FIELD_WIDTH;
                        if !slice_and_trim(&line, start, end).is_empty() {
                            fields.push(parse_index(
                                &line,
                                line_num,
                                start,
                                end,
                                SERIAL_WIDTH,
                                "CONECT serial",
                            )?);
                        }
                        start = end;
                    }
                    if let Some((&center, partners)) = fields.split_first() {
                        for &partner in partners {
                            raw_bonds.push((line_num, center, partner));
                        }
                    }
                }
                "TER" | "MODEL" | "MASTER" => {}
                "END" | "ENDMDL" => break,
                "" => {
                    if !line.trim().is_empty() {
                        header_lines.push(line);
                    }
                }
                _ => header_lines.push(line),
            }
        }

        let cell = cell.ok_or_else(|| PdbError::MissingRecord("CRYST1".into()))?;
        if particles.is_empty() {
            return Err(PdbError::MissingRecord("ATOM/HETATM records".into()));
        }

        let mut bonds = Vec::with_capacity(raw_bonds.len());
        for (line_num, a, b) in raw_bonds {
            let lookup = |serial: usize| {
                serial_map.get(&serial).copied().ok_or_else(|| {
                    PdbError::Inconsistency(format!(
                        "CONECT on line {} references unknown atom serial {}",
                        line_num, serial
                    ))
                })
            };
            bonds.push(Bond::new(lookup(a)?, lookup(b)?));
        }

        let mut topology = Topology::new(cell, particles, bonds, options.bond_policy)?;
        topology.header_lines = header_lines;
        debug!(
            "Read {} particles and {} bonds.",
            topology.particles().len(),
            topology.bonds().len()
        );
        Ok(topology)
    }

    fn write_to(topology: &Topology, writer: &mut impl Write) -> Result<(), Self::Error> {
        for line in &topology.header_lines {
            writeln!(writer, "{}", line)?;
        }

        let cell = topology.cell();
        writeln!(
            writer,
            "CRYST1{:>9.3}{:>9.3}{:>9.3}{:>7.2}{:>7.2}{:>7.2} {:<11}{:>4}",
            cell.a, cell.b, cell.c, 90.0, 90.0, 90.0, "P 1", 1
        )?;

        for particle in topology.particles() {
            let serial = fixed_field(particle.serial, SERIAL_WIDTH, "serial")?;
            let residue_seq =
                fixed_field(particle.residue_seq, RESIDUE_SEQ_WIDTH, "residue sequence")?;
            writeln!(
                writer,
                "HETATM{:>5} {:<4} {:>3}  {:>4}    {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}",
                serial,
                format_atom_name(&particle.name, &particle.element),
                particle.residue_name,
                residue_seq,
                particle.position.x,
                particle.position.y,
                particle.position.z,
                1.0,
                0.0,
                particle.element
            )?;
        }
        writeln!(writer, "TER")?;

        let mut neighbors: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for bond in topology.bonds() {
            neighbors.entry(bond.serial1).or_default().push(bond.serial2);
            neighbors.entry(bond.serial2).or_default().push(bond.serial1);
        }
        for (center, mut partners) in neighbors {
            partners.sort_unstable();
            let center = fixed_field(center, SERIAL_WIDTH, "CONECT serial")?;
            for chunk in partners.chunks(CONECT_PARTNERS_PER_RECORD) {
                write!(writer, "CONECT{:>5}", center)?;
                for &partner in chunk {
                    write!(writer, "{:>5}", fixed_field(partner, SERIAL_WIDTH, "CONECT serial")?)?;
                }
                writeln!(writer)?;
            }
        }

        writeln!(writer, "END")?;
        Ok(())
    }
}
