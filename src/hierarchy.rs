use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::info;

use crate::breadcrumbs::{Hierarchy, Node};
use crate::errors::Error;
use crate::parsing::{self, NomCode};
use crate::sfga::{Archive, TaxonNameRow};
use crate::utils::CancelToken;

/// Builds the `id → node` map for one source.
///
/// A reader on the calling thread streams taxon+name rows into an unbuffered
/// channel, worker threads parse and normalise them, and a collector
/// assembles the map. The SQLite handle never leaves the calling thread;
/// workers only ever see value-typed rows.
///
/// The caller treats this stage as best-effort: an error (other than
/// cancellation) degrades the source to flat classification.
pub fn build(archive: &Archive, jobs: usize, cancel: &CancelToken) -> Result<Hierarchy, Error> {
    let jobs = jobs.max(1);
    let (row_tx, row_rx) = bounded::<TaxonNameRow>(0);
    let (node_tx, node_rx) = bounded::<Node>(jobs);

    thread::scope(|scope| {
        for _ in 0..jobs {
            let rows = row_rx.clone();
            let nodes = node_tx.clone();
            let cancel = cancel.clone();
            scope.spawn(move || worker(rows, nodes, cancel));
        }
        // the scope keeps the originals; workers own the clones
        drop(row_rx);
        drop(node_tx);

        let collector = scope.spawn(move || {
            let mut map = Hierarchy::new();
            for node in node_rx {
                map.insert(node.id.clone(), node);
            }
            map
        });

        let read_result = archive.each_taxon_name(&mut |row| {
            if cancel.is_cancelled() {
                return Ok(false);
            }
            // a send only fails when every worker is gone
            Ok(row_tx.send(row).is_ok())
        });
        drop(row_tx);

        let map = collector.join().expect("hierarchy collector panicked");

        read_result?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        info!(nodes = map.len(), "hierarchy assembled");
        Ok(map)
    })
}

fn worker(rows: Receiver<TaxonNameRow>, nodes: Sender<Node>, cancel: CancelToken) {
    for row in rows {
        if cancel.is_cancelled() {
            break;
        }
        if nodes.send(normalise(row)).is_err() {
            break;
        }
    }
}

/// Node normalisation: ranks are lowercased, a self-referencing parent
/// means no parent, and a name the parser cannot handle leaves the
/// canonical empty. The botanical code is pinned here so constructs like
/// `Aus (Bus)` do not read as subgenus binomials.
fn normalise(row: TaxonNameRow) -> Node {
    let canonical = parsing::canonical(&row.scientific_name, NomCode::Botanical).unwrap_or_default();
    let parent_id = if row.parent_id == row.id {
        String::new()
    }
    else {
        row.parent_id
    };

    Node {
        id: row.id,
        parent_id,
        rank: row.rank.to_lowercase(),
        canonical_name: canonical,
        taxonomic_status: row.status,
    }
}


#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::*;

    fn archive_with(rows: &[(&str, &str, &str, &str, &str)]) -> (tempfile::TempDir, Archive) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0001_tree.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE name (col__id TEXT, col__scientific_name TEXT, col__rank_id TEXT);
             CREATE TABLE taxon (col__id TEXT, col__name_id TEXT, col__parent_id TEXT, col__status_id TEXT);
             CREATE TABLE synonym (col__id TEXT, col__taxon_id TEXT, col__name_id TEXT);",
        )
        .unwrap();

        for (i, (id, parent, status, name, rank)) in rows.iter().enumerate() {
            let name_id = format!("n{i}");
            conn.execute(
                "INSERT INTO name VALUES (?1, ?2, ?3)",
                rusqlite::params![name_id, name, rank],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO taxon VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, name_id, parent, status],
            )
            .unwrap();
        }
        conn.close().unwrap();

        (dir, Archive::open(&path).unwrap())
    }

    #[test]
    fn builds_the_node_map() {
        let (_dir, archive) = archive_with(&[
            ("1", "", "accepted", "Plantae", "KINGDOM"),
            ("2", "1", "accepted", "Rosa acicularis Lindl.", "species"),
        ]);

        let map = build(&archive, 2, &CancelToken::new()).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["1"].canonical_name, "Plantae");
        assert_eq!(map["1"].rank, "kingdom");
        assert_eq!(map["2"].canonical_name, "Rosa acicularis");
        assert_eq!(map["2"].parent_id, "1");
    }

    #[test]
    fn self_referencing_parent_is_cleared() {
        let (_dir, archive) = archive_with(&[("root", "root", "accepted", "Animalia", "kingdom")]);

        let map = build(&archive, 1, &CancelToken::new()).unwrap();
        assert_eq!(map["root"].parent_id, "");
    }

    #[test]
    fn unparseable_names_leave_canonical_empty() {
        let (_dir, archive) = archive_with(&[("1", "", "accepted", "not A Name 123", "species")]);

        let map = build(&archive, 1, &CancelToken::new()).unwrap();
        assert_eq!(map["1"].canonical_name, "");
    }

    #[test]
    fn botanical_code_reads_parenthesised_author() {
        let (_dir, archive) = archive_with(&[("1", "", "accepted", "Aus (Bus)", "genus")]);

        let map = build(&archive, 1, &CancelToken::new()).unwrap();
        assert_eq!(map["1"].canonical_name, "Aus");
    }

    #[test]
    fn cancellation_discards_the_partial_map() {
        let (_dir, archive) = archive_with(&[
            ("1", "", "accepted", "Plantae", "kingdom"),
            ("2", "1", "accepted", "Rosa", "genus"),
        ]);

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = build(&archive, 2, &cancel).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
