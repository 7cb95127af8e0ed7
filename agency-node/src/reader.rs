//! CSV-backed bet source: one record per line, five comma-separated
//! fields in wire order.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines};
use std::path::Path;

use lottery_network::protocol::Bet;
use lottery_network::sender::BetSource;

const FIELD_SEPARATOR: char = ',';
const FIELDS_PER_RECORD: usize = 5;

pub struct CsvBetReader<R> {
    lines: Lines<R>,
    batch_size: usize,
}

impl CsvBetReader<BufReader<File>> {
    pub fn open(path: &Path, batch_size: usize) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file), batch_size))
    }
}

impl<R: BufRead> CsvBetReader<R> {
    pub fn from_reader(reader: R, batch_size: usize) -> Self {
        Self {
            lines: reader.lines(),
            batch_size,
        }
    }
}

fn parse_line(line: &str) -> io::Result<Bet> {
    let mut fields = line.split(FIELD_SEPARATOR);
    let mut next = || {
        fields
            .next()
            .map(str::to_string)
            .ok_or_else(|| invalid_line(line))
    };
    let bet = Bet {
        first_name: next()?,
        surname: next()?,
        document: next()?,
        birthdate: next()?,
        number: next()?,
    };
    if fields.next().is_some() {
        return Err(invalid_line(line));
    }
    Ok(bet)
}

fn invalid_line(line: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("expected {FIELDS_PER_RECORD} fields: {line:?}"),
    )
}

impl<R: BufRead> BetSource for CsvBetReader<R> {
    fn next_batch(&mut self) -> io::Result<Vec<Bet>> {
        let mut batch = Vec::with_capacity(self.batch_size);
        while batch.len() < self.batch_size {
            let Some(line) = self.lines.next() else {
                break;
            };
            batch.push(parse_line(&line?)?);
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const DATA: &str = "\
Juan,Perez,12345678,1990-05-15,7574
Maria,Gomez,23456789,1985-11-02,1234
Pedro,Lopez,34567890,1978-01-30,4321
";

    #[test]
    fn batches_are_bounded_and_ordered() {
        let mut reader = CsvBetReader::from_reader(Cursor::new(DATA), 2);

        let first = reader.next_batch().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].first_name, "Juan");
        assert_eq!(first[1].first_name, "Maria");

        let second = reader.next_batch().unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].first_name, "Pedro");
        assert_eq!(second[0].number, "4321");

        assert!(reader.next_batch().unwrap().is_empty());
        assert!(reader.next_batch().unwrap().is_empty());
    }

    #[test]
    fn malformed_line_is_an_error() {
        let mut reader = CsvBetReader::from_reader(Cursor::new("Juan,Perez,12345678\n"), 10);
        let err = reader.next_batch().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn extra_fields_are_an_error() {
        let data = "Juan,Perez,12345678,1990-05-15,7574,extra\n";
        let mut reader = CsvBetReader::from_reader(Cursor::new(data), 10);
        assert!(reader.next_batch().is_err());
    }
}
