//! CSV adapters for the tables an assignment run consumes and produces.
//!
//! Input tables carry a header row. The assignment table is written and read
//! as two headerless columns, `reviewer,paper`.

use paperassign_domain::{
    Assignment, BidPreference, PaperId, Reviewer, ReviewerId, ScoreError, ScoreMatrix,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    io::{self, BufReader, Read, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to open '{}': {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("Row {row}: {source}")]
    Row { row: usize, source: ScoreError },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub fn open_table(path: &Path) -> Result<BufReader<File>, LoadError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })
}

fn records<R: Read, T: for<'de> Deserialize<'de>>(reader: R) -> Result<Vec<T>, LoadError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
        .deserialize()
        .map(|row| row.map_err(LoadError::from))
        .collect()
}

#[derive(Debug, Deserialize)]
struct ReviewerRecord {
    id: u32,
    #[serde(default)]
    country: String,
    #[serde(default)]
    min: Option<u32>,
    #[serde(default)]
    max: Option<u32>,
    #[serde(default)]
    last: Option<u8>,
}

/// `id,country,min,max,last`; `min`/`max` may be empty, `last` is `1` for
/// last-minute reviewers.
pub fn read_reviewers<R: Read>(reader: R) -> Result<Vec<Reviewer>, LoadError> {
    let rows: Vec<ReviewerRecord> = records(reader)?;
    Ok(rows
        .into_iter()
        .map(|row| Reviewer {
            id: ReviewerId(row.id),
            country: row.country,
            min_load: row.min,
            max_load: row.max,
            is_last_minute: row.last == Some(1),
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct PaperRecord {
    id: u32,
}

pub fn read_papers<R: Read>(reader: R) -> Result<Vec<PaperId>, LoadError> {
    let rows: Vec<PaperRecord> = records(reader)?;
    Ok(rows.into_iter().map(|row| PaperId(row.id)).collect())
}

#[derive(Debug, Deserialize, Serialize)]
struct ScoreRecord {
    reviewer: u32,
    paper: u32,
    score: i64,
}

/// `reviewer,paper,score`. Repeated pairs are summed.
pub fn read_scores<R: Read>(reader: R) -> Result<ScoreMatrix, LoadError> {
    let rows: Vec<ScoreRecord> = records(reader)?;
    let mut scores = ScoreMatrix::new();
    for (idx, row) in rows.into_iter().enumerate() {
        scores
            .add(ReviewerId(row.reviewer), PaperId(row.paper), row.score)
            .map_err(|source| LoadError::Row {
                row: idx + 1,
                source,
            })?;
    }
    Ok(scores)
}

pub fn write_scores<W: Write>(writer: W, scores: &ScoreMatrix) -> Result<(), LoadError> {
    let mut out = csv::Writer::from_writer(writer);
    for (reviewer, paper, score) in scores.iter() {
        out.serialize(ScoreRecord {
            reviewer: reviewer.0,
            paper: paper.0,
            score,
        })?;
    }
    out.flush()?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct AuthorCountryRecord {
    paper: u32,
    country: String,
}

/// `paper,country`, one row per author.
pub fn read_author_countries<R: Read>(
    reader: R,
) -> Result<BTreeMap<PaperId, BTreeSet<String>>, LoadError> {
    let rows: Vec<AuthorCountryRecord> = records(reader)?;
    let mut countries: BTreeMap<PaperId, BTreeSet<String>> = BTreeMap::new();
    for row in rows {
        countries
            .entry(PaperId(row.paper))
            .or_default()
            .insert(row.country);
    }
    Ok(countries)
}

#[derive(Debug, Deserialize)]
struct TopicRecord {
    id: u32,
    topic: String,
}

/// `id,topic`, used for both reviewer and paper topics.
pub fn read_topics<R: Read, K: Ord>(
    reader: R,
    key: impl Fn(u32) -> K,
) -> Result<BTreeMap<K, BTreeSet<String>>, LoadError> {
    let rows: Vec<TopicRecord> = records(reader)?;
    let mut topics: BTreeMap<K, BTreeSet<String>> = BTreeMap::new();
    for row in rows {
        topics.entry(key(row.id)).or_default().insert(row.topic);
    }
    Ok(topics)
}

#[derive(Debug, Deserialize)]
struct BidRecord {
    reviewer: u32,
    paper: u32,
    preference: String,
}

/// `reviewer,paper,preference` with preference one of yes, maybe, no.
pub fn read_bids<R: Read>(
    reader: R,
) -> Result<Vec<(ReviewerId, PaperId, BidPreference)>, LoadError> {
    let rows: Vec<BidRecord> = records(reader)?;
    rows.into_iter()
        .enumerate()
        .map(|(idx, row)| {
            let preference = row
                .preference
                .parse()
                .map_err(|source| LoadError::Row {
                    row: idx + 1,
                    source,
                })?;
            Ok((ReviewerId(row.reviewer), PaperId(row.paper), preference))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct PairRecord {
    reviewer: u32,
    paper: u32,
}

/// `reviewer,paper` declared conflicts of interest.
pub fn read_declared_conflicts<R: Read>(
    reader: R,
) -> Result<Vec<(ReviewerId, PaperId)>, LoadError> {
    let rows: Vec<PairRecord> = records(reader)?;
    Ok(rows
        .into_iter()
        .map(|row| (ReviewerId(row.reviewer), PaperId(row.paper)))
        .collect())
}

pub fn write_assignment<W: Write>(writer: W, assignment: &Assignment) -> Result<(), LoadError> {
    let mut out = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    for (reviewer, paper) in assignment.pairs() {
        out.serialize((reviewer.0, paper.0))?;
    }
    out.flush()?;
    Ok(())
}

pub fn read_assignment<R: Read>(reader: R) -> Result<Assignment, LoadError> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(reader)
        .deserialize::<(u32, u32)>()
        .map(|row| {
            row.map(|(reviewer, paper)| (ReviewerId(reviewer), PaperId(paper)))
                .map_err(LoadError::from)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn reads_reviewers_with_optional_columns() {
        let csv = "id,country,min,max,last\n1,JP,,4,\n2,FR,1,,1\n3, DE ,,,0\n";

        let reviewers = read_reviewers(csv.as_bytes()).expect("valid table");

        assert_eq!(
            reviewers,
            vec![
                Reviewer::new(ReviewerId(1), "JP").with_max_load(4),
                Reviewer::new(ReviewerId(2), "FR")
                    .with_min_load(1)
                    .last_minute(),
                Reviewer::new(ReviewerId(3), "DE"),
            ]
        );
    }

    #[test]
    fn reviewer_table_without_override_columns() {
        let reviewers = read_reviewers("id,country\n5,BR\n".as_bytes()).expect("valid table");
        assert_eq!(reviewers, vec![Reviewer::new(ReviewerId(5), "BR")]);
    }

    #[test]
    fn scores_sum_repeated_pairs() {
        let csv = "reviewer,paper,score\n1,2,10\n1,2,1000\n2,2,-5\n";

        let scores = read_scores(csv.as_bytes()).expect("valid table");

        assert_eq!(scores.get(ReviewerId(1), PaperId(2)), 1010);
        assert_eq!(scores.get(ReviewerId(2), PaperId(2)), -5);
        assert_eq!(scores.len(), 2);
    }

    #[test]
    fn score_table_round_trips_through_writer() {
        let scores: ScoreMatrix = [(ReviewerId(1), PaperId(3), 42)].into_iter().collect();
        let mut buffer = Vec::new();

        write_scores(&mut buffer, &scores).expect("write");

        assert_eq!(
            String::from_utf8(buffer).expect("utf8"),
            "reviewer,paper,score\n1,3,42\n"
        );
    }

    #[test]
    fn groups_author_countries_and_topics() {
        let countries =
            read_author_countries("paper,country\n1,JP\n1,US\n2,JP\n1,JP\n".as_bytes())
                .expect("valid table");
        assert_eq!(countries[&PaperId(1)].len(), 2);
        assert_eq!(countries[&PaperId(2)].len(), 1);

        let topics = read_topics("id,topic\n4,ml\n4,nlp\n".as_bytes(), ReviewerId)
            .expect("valid table");
        assert_eq!(topics[&ReviewerId(4)].len(), 2);
    }

    #[rstest]
    #[case::all_preferences("reviewer,paper,preference\n1,1,yes\n1,2,maybe\n2,1,no\n", 3)]
    #[case::header_only("reviewer,paper,preference\n", 0)]
    fn reads_bids(#[case] csv: &str, #[case] expected: usize) {
        let bids = read_bids(csv.as_bytes()).expect("valid table");
        assert_eq!(bids.len(), expected);
    }

    #[test]
    fn bid_with_unknown_preference_names_the_row() {
        let err = read_bids("reviewer,paper,preference\n1,1,yes\n1,2,sure\n".as_bytes())
            .expect_err("bad preference");
        assert!(matches!(err, LoadError::Row { row: 2, .. }));
    }

    #[test]
    fn overflowing_score_sum_names_the_row() {
        let csv = "reviewer,paper,score\n1,1,9223372036854775807\n2,1,4\n1,1,1\n";

        let err = read_scores(csv.as_bytes()).expect_err("sum overflows");

        assert!(matches!(
            err,
            LoadError::Row {
                row: 3,
                source: ScoreError::Overflow { .. },
            }
        ));
    }

    #[test]
    fn assignment_is_written_headerless_and_read_back() {
        let assignment: Assignment = [
            (ReviewerId(2), PaperId(1)),
            (ReviewerId(1), PaperId(2)),
        ]
        .into_iter()
        .collect();
        let mut buffer = Vec::new();

        write_assignment(&mut buffer, &assignment).expect("write");
        let written = String::from_utf8(buffer).expect("utf8");

        assert_eq!(written, "1,2\n2,1\n");
        assert_eq!(
            read_assignment(written.as_bytes()).expect("read"),
            assignment
        );
    }

    #[test]
    fn malformed_numbers_are_csv_errors() {
        let err = read_papers("id\nabc\n".as_bytes()).expect_err("not a number");
        assert!(matches!(err, LoadError::Csv(_)));
    }
}
