pub use crate::storage::Storage;
use crate::error::{CoreError, CoreResult};
use crate::model::{Document, Journal, Link, Snippet, Specimen, Taxon};
use crate::mysql_misc::MySQLMisc;
use async_trait::async_trait;
use mysql_async::{from_row, params, prelude::*, Pool};

/// `Storage` over the seven-table schema of §3, reached the way the
/// teacher's storage layer always has: a pooled `mysql_async` connection,
/// `exec_iter`/`exec_drop` with named `params!`, rows decoded through
/// `from_row`.
#[derive(Debug, Clone)]
pub struct StorageMySQL {
    pool: Pool,
}

impl MySQLMisc for StorageMySQL {
    fn pool(&self) -> &Pool {
        &self.pool
    }
}

impl StorageMySQL {
    pub fn new(db_url: &str) -> CoreResult<Self> {
        Ok(Self { pool: Self::create_pool(db_url)? })
    }

    /// Runs the schema DDL for all seven tables, for local/CI setup.
    /// Grounded in the teacher's pattern of shipping schema as inline SQL
    /// rather than a migrations framework.
    pub async fn create_schema(&self) -> CoreResult<()> {
        let mut conn = self.pool.get_conn().await.map_err(|e| db_err("<schema>", e))?;
        for stmt in SCHEMA_STATEMENTS {
            conn.query_drop(*stmt).await.map_err(|e| db_err("<schema>", e))?;
        }
        Ok(())
    }
}

const SCHEMA_STATEMENTS: &[&str] = &[
    r"CREATE TABLE IF NOT EXISTS `journals` (
        `title` VARCHAR(255) NOT NULL PRIMARY KEY,
        `topic` VARCHAR(64) NULL
    ) CHARACTER SET utf8mb4 COLLATE utf8mb4_general_ci",
    r"CREATE TABLE IF NOT EXISTS `documents` (
        `url` VARCHAR(512) NOT NULL PRIMARY KEY,
        `publication_url` VARCHAR(512) NULL,
        `kind` VARCHAR(64) NULL,
        `authors` TEXT NULL,
        `title` VARCHAR(255) NULL,
        `year` VARCHAR(16) NULL,
        `publication` VARCHAR(255) NULL,
        `volume` VARCHAR(32) NULL,
        `number` VARCHAR(32) NULL,
        `pages` VARCHAR(32) NULL,
        `doi` VARCHAR(255) NULL,
        `topic` VARCHAR(64) NULL,
        `num_specimens` BIGINT NOT NULL DEFAULT 0,
        `num_snippets` BIGINT NOT NULL DEFAULT 0,
        KEY `documents_topic` (`topic`)
    )",
    r"CREATE TABLE IF NOT EXISTS `snippets` (
        `id` VARCHAR(700) NOT NULL PRIMARY KEY,
        `doc_url` VARCHAR(512) NOT NULL,
        `page_id` VARCHAR(64) NULL,
        `snippet` TEXT NOT NULL,
        `notes` TEXT NULL,
        KEY `snippets_doc_url` (`doc_url`)
    )",
    r"CREATE TABLE IF NOT EXISTS `specimens` (
        `id` VARCHAR(700) NOT NULL PRIMARY KEY,
        `snippet_id` VARCHAR(700) NOT NULL,
        `verbatim` VARCHAR(255) NOT NULL,
        `spec_num` VARCHAR(255) NOT NULL,
        KEY `specimens_snippet_id` (`snippet_id`)
    )",
    r"CREATE TABLE IF NOT EXISTS `links` (
        `id` VARCHAR(900) NOT NULL PRIMARY KEY,
        `doc_url` VARCHAR(512) NOT NULL,
        `verbatim` VARCHAR(255) NOT NULL,
        `spec_num` VARCHAR(255) NOT NULL,
        `ezid` TEXT NULL,
        `match_quality` VARCHAR(255) NULL,
        `department` VARCHAR(64) NULL,
        `has_similar_ref` BOOL NOT NULL DEFAULT FALSE,
        `num_snippets` BIGINT NOT NULL DEFAULT 0,
        `notes` TEXT NULL,
        KEY `links_doc_url` (`doc_url`)
    )",
    r"CREATE TABLE IF NOT EXISTS `taxa` (
        `name` VARCHAR(255) NOT NULL PRIMARY KEY,
        `rank` VARCHAR(64) NULL,
        `department` VARCHAR(64) NULL
    )",
];

fn db_err(table: &str, e: impl std::fmt::Display) -> CoreError {
    CoreError::ConstraintViolation { table: table.to_string(), reason: e.to_string() }
}

fn journal_from_row((title, topic): (String, Option<String>)) -> Journal {
    Journal { title, topic }
}

#[allow(clippy::type_complexity)]
fn document_from_row(
    (url, publication_url, kind, authors, title, year, publication, volume, number, pages, doi, topic, num_specimens, num_snippets): (
        String,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        i64,
        i64,
    ),
) -> Document {
    Document {
        url,
        publication_url,
        kind,
        authors,
        title,
        year,
        publication,
        volume,
        number,
        pages,
        doi,
        topic,
        num_specimens,
        num_snippets,
    }
}

fn snippet_from_row((id, doc_url, page_id, snippet, notes): (String, String, Option<String>, String, Option<String>)) -> Snippet {
    Snippet { id, doc_url, page_id, snippet, notes }
}

fn specimen_from_row((id, snippet_id, verbatim, spec_num): (String, String, String, String)) -> Specimen {
    Specimen { id, snippet_id, verbatim, spec_num }
}

#[allow(clippy::type_complexity)]
fn link_from_row(
    (id, doc_url, verbatim, spec_num, ezid, match_quality, department, has_similar_ref, num_snippets, notes): (
        String,
        String,
        String,
        String,
        Option<String>,
        Option<String>,
        Option<String>,
        bool,
        i64,
        Option<String>,
    ),
) -> Link {
    Link { id, doc_url, verbatim, spec_num, ezid, match_quality, department, has_similar_ref, num_snippets, notes }
}

fn taxon_from_row((name, rank, department): (String, Option<String>, Option<String>)) -> Taxon {
    Taxon { name, rank, department }
}

const DOCUMENT_COLUMNS: &str = "`url`,`publication_url`,`kind`,`authors`,`title`,`year`,`publication`,`volume`,`number`,`pages`,`doi`,`topic`,`num_specimens`,`num_snippets`";
const SNIPPET_COLUMNS: &str = "`id`,`doc_url`,`page_id`,`snippet`,`notes`";
const SPECIMEN_COLUMNS: &str = "`id`,`snippet_id`,`verbatim`,`spec_num`";
const LINK_COLUMNS: &str = "`id`,`doc_url`,`verbatim`,`spec_num`,`ezid`,`match_quality`,`department`,`has_similar_ref`,`num_snippets`,`notes`";

#[async_trait]
impl Storage for StorageMySQL {
    async fn disconnect(&self) -> CoreResult<()> {
        self.disconnect_db().await
    }

    async fn upsert_journal(&self, journal: &Journal) -> CoreResult<()> {
        let mut conn = self.pool.get_conn().await.map_err(|e| db_err("journals", e))?;
        let sql = "INSERT INTO `journals` (`title`,`topic`) VALUES (:title,:topic) \
            ON DUPLICATE KEY UPDATE `topic`=VALUES(`topic`)";
        conn.exec_drop(sql, params! {"title" => &journal.title, "topic" => &journal.topic})
            .await
            .map_err(|e| db_err("journals", e))
    }

    async fn get_journal(&self, title: &str) -> CoreResult<Option<Journal>> {
        let mut conn = self.pool.get_conn().await.map_err(|e| db_err("journals", e))?;
        let sql = "SELECT `title`,`topic` FROM `journals` WHERE LOWER(`title`)=LOWER(:title)";
        let rows = conn
            .exec_iter(sql, params! {"title" => title})
            .await
            .map_err(|e| db_err("journals", e))?
            .map_and_drop(from_row)
            .await
            .map_err(|e| db_err("journals", e))?;
        Ok(rows.into_iter().next().map(journal_from_row))
    }

    async fn upsert_document(&self, document: &Document) -> CoreResult<()> {
        let mut conn = self.pool.get_conn().await.map_err(|e| db_err("documents", e))?;
        let sql = format!(
            "INSERT INTO `documents` ({DOCUMENT_COLUMNS}) VALUES \
            (:url,:publication_url,:kind,:authors,:title,:year,:publication,:volume,:number,:pages,:doi,:topic,:num_specimens,:num_snippets) \
            ON DUPLICATE KEY UPDATE `publication_url`=VALUES(`publication_url`),`kind`=VALUES(`kind`),`authors`=VALUES(`authors`), \
            `title`=VALUES(`title`),`year`=VALUES(`year`),`publication`=VALUES(`publication`),`volume`=VALUES(`volume`), \
            `number`=VALUES(`number`),`pages`=VALUES(`pages`),`doi`=VALUES(`doi`),`topic`=VALUES(`topic`), \
            `num_specimens`=VALUES(`num_specimens`),`num_snippets`=VALUES(`num_snippets`)"
        );
        conn.exec_drop(
            sql,
            params! {
                "url" => &document.url,
                "publication_url" => &document.publication_url,
                "kind" => &document.kind,
                "authors" => &document.authors,
                "title" => &document.title,
                "year" => &document.year,
                "publication" => &document.publication,
                "volume" => &document.volume,
                "number" => &document.number,
                "pages" => &document.pages,
                "doi" => &document.doi,
                "topic" => &document.topic,
                "num_specimens" => document.num_specimens,
                "num_snippets" => document.num_snippets,
            },
        )
        .await
        .map_err(|e| db_err("documents", e))
    }

    async fn get_document(&self, url: &str) -> CoreResult<Option<Document>> {
        let mut conn = self.pool.get_conn().await.map_err(|e| db_err("documents", e))?;
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM `documents` WHERE `url`=:url");
        let rows = conn
            .exec_iter(sql, params! {"url" => url})
            .await
            .map_err(|e| db_err("documents", e))?
            .map_and_drop(from_row)
            .await
            .map_err(|e| db_err("documents", e))?;
        Ok(rows.into_iter().next().map(document_from_row))
    }

    async fn documents_by_topic(&self, topic: &str) -> CoreResult<Vec<Document>> {
        let mut conn = self.pool.get_conn().await.map_err(|e| db_err("documents", e))?;
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM `documents` WHERE `topic`=:topic");
        let rows = conn
            .exec_iter(sql, params! {"topic" => topic})
            .await
            .map_err(|e| db_err("documents", e))?
            .map_and_drop(from_row)
            .await
            .map_err(|e| db_err("documents", e))?;
        Ok(rows.into_iter().map(document_from_row).collect())
    }

    async fn all_documents(&self) -> CoreResult<Vec<Document>> {
        let mut conn = self.pool.get_conn().await.map_err(|e| db_err("documents", e))?;
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM `documents`");
        let rows = conn
            .exec_iter(sql, ())
            .await
            .map_err(|e| db_err("documents", e))?
            .map_and_drop(from_row)
            .await
            .map_err(|e| db_err("documents", e))?;
        Ok(rows.into_iter().map(document_from_row).collect())
    }

    async fn upsert_snippet(&self, snippet: &Snippet) -> CoreResult<()> {
        let mut conn = self.pool.get_conn().await.map_err(|e| db_err("snippets", e))?;
        let sql = format!(
            "INSERT INTO `snippets` ({SNIPPET_COLUMNS}) VALUES (:id,:doc_url,:page_id,:snippet,:notes) \
            ON DUPLICATE KEY UPDATE `snippet`=VALUES(`snippet`),`notes`=VALUES(`notes`)"
        );
        conn.exec_drop(
            sql,
            params! {
                "id" => &snippet.id,
                "doc_url" => &snippet.doc_url,
                "page_id" => &snippet.page_id,
                "snippet" => &snippet.snippet,
                "notes" => &snippet.notes,
            },
        )
        .await
        .map_err(|e| db_err("snippets", e))
    }

    async fn snippets_for_document(&self, doc_url: &str) -> CoreResult<Vec<Snippet>> {
        let mut conn = self.pool.get_conn().await.map_err(|e| db_err("snippets", e))?;
        let sql = format!("SELECT {SNIPPET_COLUMNS} FROM `snippets` WHERE `doc_url`=:doc_url");
        let rows = conn
            .exec_iter(sql, params! {"doc_url" => doc_url})
            .await
            .map_err(|e| db_err("snippets", e))?
            .map_and_drop(from_row)
            .await
            .map_err(|e| db_err("snippets", e))?;
        Ok(rows.into_iter().map(snippet_from_row).collect())
    }

    async fn upsert_specimen(&self, specimen: &Specimen) -> CoreResult<()> {
        let mut conn = self.pool.get_conn().await.map_err(|e| db_err("specimens", e))?;
        let sql = format!(
            "INSERT INTO `specimens` ({SPECIMEN_COLUMNS}) VALUES (:id,:snippet_id,:verbatim,:spec_num) \
            ON DUPLICATE KEY UPDATE `verbatim`=VALUES(`verbatim`),`spec_num`=VALUES(`spec_num`)"
        );
        conn.exec_drop(
            sql,
            params! {
                "id" => &specimen.id,
                "snippet_id" => &specimen.snippet_id,
                "verbatim" => &specimen.verbatim,
                "spec_num" => &specimen.spec_num,
            },
        )
        .await
        .map_err(|e| db_err("specimens", e))
    }

    async fn specimens_for_snippet(&self, snippet_id: &str) -> CoreResult<Vec<Specimen>> {
        let mut conn = self.pool.get_conn().await.map_err(|e| db_err("specimens", e))?;
        let sql = format!("SELECT {SPECIMEN_COLUMNS} FROM `specimens` WHERE `snippet_id`=:snippet_id");
        let rows = conn
            .exec_iter(sql, params! {"snippet_id" => snippet_id})
            .await
            .map_err(|e| db_err("specimens", e))?
            .map_and_drop(from_row)
            .await
            .map_err(|e| db_err("specimens", e))?;
        Ok(rows.into_iter().map(specimen_from_row).collect())
    }

    async fn upsert_link(&self, link: &Link) -> CoreResult<()> {
        let mut conn = self.pool.get_conn().await.map_err(|e| db_err("links", e))?;
        let sql = format!(
            "INSERT INTO `links` ({LINK_COLUMNS}) VALUES \
            (:id,:doc_url,:verbatim,:spec_num,:ezid,:match_quality,:department,:has_similar_ref,:num_snippets,:notes) \
            ON DUPLICATE KEY UPDATE `ezid`=VALUES(`ezid`),`match_quality`=VALUES(`match_quality`),`department`=VALUES(`department`), \
            `has_similar_ref`=VALUES(`has_similar_ref`),`num_snippets`=VALUES(`num_snippets`),`notes`=VALUES(`notes`)"
        );
        conn.exec_drop(
            sql,
            params! {
                "id" => &link.id,
                "doc_url" => &link.doc_url,
                "verbatim" => &link.verbatim,
                "spec_num" => &link.spec_num,
                "ezid" => &link.ezid,
                "match_quality" => &link.match_quality,
                "department" => &link.department,
                "has_similar_ref" => link.has_similar_ref,
                "num_snippets" => link.num_snippets,
                "notes" => &link.notes,
            },
        )
        .await
        .map_err(|e| db_err("links", e))
    }

    async fn get_link(&self, id: &str) -> CoreResult<Option<Link>> {
        let mut conn = self.pool.get_conn().await.map_err(|e| db_err("links", e))?;
        let sql = format!("SELECT {LINK_COLUMNS} FROM `links` WHERE `id`=:id");
        let rows = conn
            .exec_iter(sql, params! {"id" => id})
            .await
            .map_err(|e| db_err("links", e))?
            .map_and_drop(from_row)
            .await
            .map_err(|e| db_err("links", e))?;
        Ok(rows.into_iter().next().map(link_from_row))
    }

    async fn links_for_document(&self, doc_url: &str) -> CoreResult<Vec<Link>> {
        let mut conn = self.pool.get_conn().await.map_err(|e| db_err("links", e))?;
        let sql = format!("SELECT {LINK_COLUMNS} FROM `links` WHERE `doc_url`=:doc_url");
        let rows = conn
            .exec_iter(sql, params! {"doc_url" => doc_url})
            .await
            .map_err(|e| db_err("links", e))?
            .map_and_drop(from_row)
            .await
            .map_err(|e| db_err("links", e))?;
        Ok(rows.into_iter().map(link_from_row).collect())
    }

    async fn links_needing_match(&self, limit: usize) -> CoreResult<Vec<Link>> {
        let mut conn = self.pool.get_conn().await.map_err(|e| db_err("links", e))?;
        let sql = format!(
            "SELECT {LINK_COLUMNS} FROM `links` WHERE `ezid` IS NULL OR `match_quality` IS NULL OR `match_quality`='No match' LIMIT :limit"
        );
        let rows = conn
            .exec_iter(sql, params! {"limit" => limit as u64})
            .await
            .map_err(|e| db_err("links", e))?
            .map_and_drop(from_row)
            .await
            .map_err(|e| db_err("links", e))?;
        Ok(rows.into_iter().map(link_from_row).collect())
    }

    async fn upsert_taxon(&self, taxon: &Taxon) -> CoreResult<()> {
        let mut conn = self.pool.get_conn().await.map_err(|e| db_err("taxa", e))?;
        let sql = "INSERT INTO `taxa` (`name`,`rank`,`department`) VALUES (:name,:rank,:department) \
            ON DUPLICATE KEY UPDATE `rank`=VALUES(`rank`),`department`=VALUES(`department`)";
        conn.exec_drop(sql, params! {"name" => &taxon.name, "rank" => &taxon.rank, "department" => &taxon.department})
            .await
            .map_err(|e| db_err("taxa", e))
    }

    async fn get_taxon(&self, name: &str) -> CoreResult<Option<Taxon>> {
        let mut conn = self.pool.get_conn().await.map_err(|e| db_err("taxa", e))?;
        let sql = "SELECT `name`,`rank`,`department` FROM `taxa` WHERE LOWER(`name`)=LOWER(:name)";
        let rows = conn
            .exec_iter(sql, params! {"name" => name})
            .await
            .map_err(|e| db_err("taxa", e))?
            .map_and_drop(from_row)
            .await
            .map_err(|e| db_err("taxa", e))?;
        Ok(rows.into_iter().next().map(taxon_from_row))
    }
}
