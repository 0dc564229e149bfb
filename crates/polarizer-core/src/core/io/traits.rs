use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

/// Defines the interface for reading and writing one of the model file formats.
///
/// Implementors handle format-specific parsing and serialization of a single in-memory
/// model (a topology or a force field).
pub trait ModelFile {
    /// The in-memory model this format describes.
    type Model;

    /// Options that influence parsing.
    type ReadOptions: Default;

    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads a model from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_from(
        reader: &mut impl BufRead,
        options: &Self::ReadOptions,
    ) -> Result<Self::Model, Self::Error>;

    /// Writes a model to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be represented in the format or writing
    /// fails.
    fn write_to(model: &Self::Model, writer: &mut impl Write) -> Result<(), Self::Error>;

    /// Reads a model from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(
        path: P,
        options: &Self::ReadOptions,
    ) -> Result<Self::Model, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader, options)
    }

    /// Serializes a model into memory.
    ///
    /// Used to render every output completely before the first file is created.
    fn to_bytes(model: &Self::Model) -> Result<Vec<u8>, Self::Error> {
        let mut buffer = Vec::new();
        Self::write_to(model, &mut buffer)?;
        Ok(buffer)
    }
}
