//! Shared fixtures for live-database integration tests
//!
//! Tests run against the database named by `CHADO_TEST_DATABASE_URL` and
//! skip silently when it is not set. Each call to [`setup`] rebuilds the
//! CHADO core tables from scratch, so tests are serialized with
//! `#[serial]`.

use chado_engine::db::DbConfig;
use chado_engine::PgPool;

/// CHADO 1.31 core tables, dependency-ordered, with the uniqueness
/// constraints the importer's all-or-nothing behavior is tested against.
const SCHEMA_DDL: &str = r#"
DROP TABLE IF EXISTS feature_synonym, synonym, feature_relationship,
    featureprop, featureloc, feature, pub, organism, cvterm, cv, dbxref, db
    CASCADE;

CREATE TABLE db (
    db_id SERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL UNIQUE,
    description VARCHAR(255),
    urlprefix VARCHAR(255),
    url VARCHAR(255)
);

CREATE TABLE dbxref (
    dbxref_id SERIAL PRIMARY KEY,
    db_id INTEGER NOT NULL REFERENCES db (db_id) ON DELETE CASCADE,
    accession VARCHAR(255) NOT NULL,
    version VARCHAR(255) NOT NULL DEFAULT '',
    description TEXT,
    UNIQUE (db_id, accession, version)
);

CREATE TABLE cv (
    cv_id SERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL UNIQUE,
    definition TEXT
);

CREATE TABLE cvterm (
    cvterm_id SERIAL PRIMARY KEY,
    cv_id INTEGER NOT NULL REFERENCES cv (cv_id) ON DELETE CASCADE,
    name VARCHAR(1024) NOT NULL,
    definition TEXT,
    dbxref_id INTEGER NOT NULL UNIQUE REFERENCES dbxref (dbxref_id) ON DELETE CASCADE,
    is_obsolete INTEGER NOT NULL DEFAULT 0,
    is_relationshiptype INTEGER NOT NULL DEFAULT 0,
    UNIQUE (cv_id, name, is_obsolete)
);

CREATE TABLE organism (
    organism_id SERIAL PRIMARY KEY,
    abbreviation VARCHAR(255),
    genus VARCHAR(255) NOT NULL,
    species VARCHAR(255) NOT NULL,
    common_name VARCHAR(255),
    infraspecific_name VARCHAR(1024),
    type_id INTEGER REFERENCES cvterm (cvterm_id) ON DELETE SET NULL,
    comment TEXT,
    UNIQUE (genus, species)
);

CREATE TABLE pub (
    pub_id SERIAL PRIMARY KEY,
    title TEXT,
    volumetitle TEXT,
    volume VARCHAR(255),
    series_name VARCHAR(255),
    issue VARCHAR(255),
    pyear VARCHAR(255),
    pages VARCHAR(255),
    miniref VARCHAR(255),
    uniquename TEXT NOT NULL,
    type_id INTEGER NOT NULL REFERENCES cvterm (cvterm_id),
    is_obsolete BOOLEAN DEFAULT FALSE,
    publisher VARCHAR(255),
    pubplace VARCHAR(255),
    UNIQUE (uniquename, type_id)
);

CREATE TABLE feature (
    feature_id SERIAL PRIMARY KEY,
    dbxref_id INTEGER REFERENCES dbxref (dbxref_id) ON DELETE SET NULL,
    organism_id INTEGER NOT NULL REFERENCES organism (organism_id) ON DELETE CASCADE,
    name VARCHAR(255),
    uniquename TEXT NOT NULL,
    residues TEXT,
    seqlen INTEGER,
    md5checksum CHAR(32),
    type_id INTEGER NOT NULL REFERENCES cvterm (cvterm_id),
    is_analysis BOOLEAN NOT NULL DEFAULT FALSE,
    is_obsolete BOOLEAN NOT NULL DEFAULT FALSE,
    timeaccessioned TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    timelastmodified TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (organism_id, uniquename, type_id)
);

CREATE TABLE featureloc (
    featureloc_id SERIAL PRIMARY KEY,
    feature_id INTEGER NOT NULL REFERENCES feature (feature_id) ON DELETE CASCADE,
    srcfeature_id INTEGER REFERENCES feature (feature_id) ON DELETE SET NULL,
    fmin INTEGER,
    is_fmin_partial BOOLEAN NOT NULL DEFAULT FALSE,
    fmax INTEGER,
    is_fmax_partial BOOLEAN NOT NULL DEFAULT FALSE,
    strand SMALLINT,
    phase INTEGER,
    residue_info TEXT,
    locgroup INTEGER NOT NULL DEFAULT 0,
    rank INTEGER NOT NULL DEFAULT 0,
    UNIQUE (feature_id, locgroup, rank)
);

CREATE TABLE featureprop (
    featureprop_id SERIAL PRIMARY KEY,
    feature_id INTEGER NOT NULL REFERENCES feature (feature_id) ON DELETE CASCADE,
    type_id INTEGER NOT NULL REFERENCES cvterm (cvterm_id),
    value TEXT,
    rank INTEGER NOT NULL DEFAULT 0,
    UNIQUE (feature_id, type_id, rank)
);

CREATE TABLE feature_relationship (
    feature_relationship_id SERIAL PRIMARY KEY,
    subject_id INTEGER NOT NULL REFERENCES feature (feature_id) ON DELETE CASCADE,
    object_id INTEGER NOT NULL REFERENCES feature (feature_id) ON DELETE CASCADE,
    type_id INTEGER NOT NULL REFERENCES cvterm (cvterm_id),
    value TEXT,
    rank INTEGER NOT NULL DEFAULT 0,
    UNIQUE (subject_id, object_id, type_id, rank)
);

CREATE TABLE synonym (
    synonym_id SERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    type_id INTEGER NOT NULL REFERENCES cvterm (cvterm_id),
    synonym_sgml VARCHAR(255) NOT NULL,
    UNIQUE (name, type_id)
);

CREATE TABLE feature_synonym (
    feature_synonym_id SERIAL PRIMARY KEY,
    synonym_id INTEGER NOT NULL REFERENCES synonym (synonym_id) ON DELETE CASCADE,
    feature_id INTEGER NOT NULL REFERENCES feature (feature_id) ON DELETE CASCADE,
    pub_id INTEGER NOT NULL REFERENCES pub (pub_id) ON DELETE CASCADE,
    is_current BOOLEAN NOT NULL DEFAULT TRUE,
    is_internal BOOLEAN NOT NULL DEFAULT FALSE,
    UNIQUE (synonym_id, feature_id, pub_id)
);
"#;

/// Minimal reference data: a vocabulary with the feature types the tests
/// use, and two organisms.
const SEED_SQL: &str = r#"
INSERT INTO db (name) VALUES ('null');
INSERT INTO cv (name) VALUES ('sequence');

INSERT INTO dbxref (db_id, accession)
SELECT db_id, 'gene' FROM db WHERE name = 'null';
INSERT INTO dbxref (db_id, accession)
SELECT db_id, 'chromosome' FROM db WHERE name = 'null';

INSERT INTO cvterm (cv_id, name, dbxref_id)
SELECT cv.cv_id, d.accession, d.dbxref_id
FROM cv, dbxref d
WHERE cv.name = 'sequence';

INSERT INTO organism (abbreviation, genus, species, common_name)
VALUES ('Dmel', 'Drosophila', 'melanogaster', 'fruit fly'),
       ('Hsapiens', 'Homo', 'sapiens', 'human');
"#;

/// Open a pool against the test database, or `None` to skip the test.
pub async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("CHADO_TEST_DATABASE_URL").ok()?;
    let config = DbConfig {
        url,
        max_connections: 5,
        min_connections: 1,
        ..DbConfig::default()
    };
    let pool = chado_engine::create_pool(&config)
        .await
        .expect("test database is reachable");
    Some(pool)
}

/// Rebuild the schema and reference data; returns `None` when the test
/// database is not configured.
pub async fn setup() -> Option<PgPool> {
    let pool = test_pool().await?;
    sqlx::raw_sql(SCHEMA_DDL)
        .execute(&pool)
        .await
        .expect("schema DDL applies");
    sqlx::raw_sql(SEED_SQL)
        .execute(&pool)
        .await
        .expect("seed data applies");
    Some(pool)
}

/// Count rows in a table.
pub async fn count_rows(pool: &PgPool, table: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) FROM {}", table);
    sqlx::query_scalar(&sql)
        .fetch_one(pool)
        .await
        .expect("count query succeeds")
}
