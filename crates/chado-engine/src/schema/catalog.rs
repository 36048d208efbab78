//! Built-in catalog of supported CHADO revisions
//!
//! Covers the core-module tables the toolkit manipulates: general (`db`,
//! `dbxref`), controlled vocabularies (`cv`, `cvterm`), organisms,
//! publications, and the sequence module (`feature` and its satellites).
//!
//! Revision 1.31 differs from 1.2, within this subset, by the
//! `infraspecific_name` and `type_id` columns on `organism`.

use super::{ColumnType, SchemaDescriptor, TableBuilder, TableDescriptor};

use ColumnType::{Boolean, Integer, Text, Timestamp};

/// All supported revisions, oldest first.
pub(crate) fn supported_versions() -> Vec<SchemaDescriptor> {
    vec![v1_2(), v1_31()]
}

fn v1_2() -> SchemaDescriptor {
    SchemaDescriptor::new("1.2", core_tables(organism_v1_2()))
}

fn v1_31() -> SchemaDescriptor {
    SchemaDescriptor::new("1.31", core_tables(organism_v1_31()))
}

fn core_tables(organism: TableDescriptor) -> Vec<TableDescriptor> {
    vec![
        db(),
        dbxref(),
        cv(),
        cvterm(),
        organism,
        pub_(),
        feature(),
        featureloc(),
        featureprop(),
        feature_relationship(),
        synonym(),
        feature_synonym(),
    ]
}

fn db() -> TableDescriptor {
    TableBuilder::new("db")
        .serial_pk("db_id")
        .column("name", Text, false)
        .column("description", Text, true)
        .column("urlprefix", Text, true)
        .column("url", Text, true)
        .build()
}

fn dbxref() -> TableDescriptor {
    TableBuilder::new("dbxref")
        .serial_pk("dbxref_id")
        .column("db_id", Integer, false)
        .column("accession", Text, false)
        .defaulted("version", Text, false)
        .column("description", Text, true)
        .resolvable_foreign_key("db_id", "db", "db_id", "name")
        .build()
}

fn cv() -> TableDescriptor {
    TableBuilder::new("cv")
        .serial_pk("cv_id")
        .column("name", Text, false)
        .column("definition", Text, true)
        .build()
}

fn cvterm() -> TableDescriptor {
    TableBuilder::new("cvterm")
        .serial_pk("cvterm_id")
        .column("cv_id", Integer, false)
        .column("name", Text, false)
        .column("definition", Text, true)
        .column("dbxref_id", Integer, false)
        .defaulted("is_obsolete", Integer, false)
        .defaulted("is_relationshiptype", Integer, false)
        .resolvable_foreign_key("cv_id", "cv", "cv_id", "name")
        .resolvable_foreign_key("dbxref_id", "dbxref", "dbxref_id", "accession")
        .build()
}

fn organism_v1_2() -> TableDescriptor {
    TableBuilder::new("organism")
        .serial_pk("organism_id")
        .column("abbreviation", Text, true)
        .column("genus", Text, false)
        .column("species", Text, false)
        .column("common_name", Text, true)
        .column("comment", Text, true)
        .build()
}

fn organism_v1_31() -> TableDescriptor {
    TableBuilder::new("organism")
        .serial_pk("organism_id")
        .column("abbreviation", Text, true)
        .column("genus", Text, false)
        .column("species", Text, false)
        .column("common_name", Text, true)
        .column("infraspecific_name", Text, true)
        .column("type_id", Integer, true)
        .column("comment", Text, true)
        .resolvable_foreign_key("type_id", "cvterm", "cvterm_id", "name")
        .build()
}

fn pub_() -> TableDescriptor {
    TableBuilder::new("pub")
        .serial_pk("pub_id")
        .column("title", Text, true)
        .column("volumetitle", Text, true)
        .column("volume", Text, true)
        .column("series_name", Text, true)
        .column("issue", Text, true)
        .column("pyear", Text, true)
        .column("pages", Text, true)
        .column("miniref", Text, true)
        .column("uniquename", Text, false)
        .column("type_id", Integer, false)
        .defaulted("is_obsolete", Boolean, true)
        .column("publisher", Text, true)
        .column("pubplace", Text, true)
        .resolvable_foreign_key("type_id", "cvterm", "cvterm_id", "name")
        .build()
}

fn feature() -> TableDescriptor {
    TableBuilder::new("feature")
        .serial_pk("feature_id")
        .column("dbxref_id", Integer, true)
        .column("organism_id", Integer, false)
        .column("name", Text, true)
        .column("uniquename", Text, false)
        .column("residues", Text, true)
        .column("seqlen", Integer, true)
        .column("md5checksum", Text, true)
        .column("type_id", Integer, false)
        .defaulted("is_analysis", Boolean, false)
        .defaulted("is_obsolete", Boolean, false)
        .defaulted("timeaccessioned", Timestamp, false)
        .defaulted("timelastmodified", Timestamp, false)
        .resolvable_foreign_key("dbxref_id", "dbxref", "dbxref_id", "accession")
        .resolvable_foreign_key("organism_id", "organism", "organism_id", "abbreviation")
        .resolvable_foreign_key("type_id", "cvterm", "cvterm_id", "name")
        .build()
}

fn featureloc() -> TableDescriptor {
    TableBuilder::new("featureloc")
        .serial_pk("featureloc_id")
        .column("feature_id", Integer, false)
        .column("srcfeature_id", Integer, true)
        .column("fmin", Integer, true)
        .defaulted("is_fmin_partial", Boolean, false)
        .column("fmax", Integer, true)
        .defaulted("is_fmax_partial", Boolean, false)
        .column("strand", Integer, true)
        .column("phase", Integer, true)
        .column("residue_info", Text, true)
        .defaulted("locgroup", Integer, false)
        .defaulted("rank", Integer, false)
        .resolvable_foreign_key("feature_id", "feature", "feature_id", "uniquename")
        .resolvable_foreign_key("srcfeature_id", "feature", "feature_id", "uniquename")
        .build()
}

fn featureprop() -> TableDescriptor {
    TableBuilder::new("featureprop")
        .serial_pk("featureprop_id")
        .column("feature_id", Integer, false)
        .column("type_id", Integer, false)
        .column("value", Text, true)
        .defaulted("rank", Integer, false)
        .resolvable_foreign_key("feature_id", "feature", "feature_id", "uniquename")
        .resolvable_foreign_key("type_id", "cvterm", "cvterm_id", "name")
        .build()
}

fn feature_relationship() -> TableDescriptor {
    TableBuilder::new("feature_relationship")
        .serial_pk("feature_relationship_id")
        .column("subject_id", Integer, false)
        .column("object_id", Integer, false)
        .column("type_id", Integer, false)
        .column("value", Text, true)
        .defaulted("rank", Integer, false)
        .resolvable_foreign_key("subject_id", "feature", "feature_id", "uniquename")
        .resolvable_foreign_key("object_id", "feature", "feature_id", "uniquename")
        .resolvable_foreign_key("type_id", "cvterm", "cvterm_id", "name")
        .build()
}

fn synonym() -> TableDescriptor {
    TableBuilder::new("synonym")
        .serial_pk("synonym_id")
        .column("name", Text, false)
        .column("type_id", Integer, false)
        .column("synonym_sgml", Text, false)
        .resolvable_foreign_key("type_id", "cvterm", "cvterm_id", "name")
        .build()
}

fn feature_synonym() -> TableDescriptor {
    TableBuilder::new("feature_synonym")
        .serial_pk("feature_synonym_id")
        .column("synonym_id", Integer, false)
        .column("feature_id", Integer, false)
        .column("pub_id", Integer, false)
        .defaulted("is_current", Boolean, false)
        .defaulted("is_internal", Boolean, false)
        .resolvable_foreign_key("synonym_id", "synonym", "synonym_id", "name")
        .resolvable_foreign_key("feature_id", "feature", "feature_id", "uniquename")
        .resolvable_foreign_key("pub_id", "pub", "pub_id", "uniquename")
        .build()
}
