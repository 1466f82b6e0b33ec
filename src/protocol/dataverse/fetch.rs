//! Query descriptions rendered as FetchXML
//!
//! A [`FetchQuery`] names the entity, the selected columns, the filter and the
//! joined entities. Paging is supplied separately for each request so the same
//! query value can be reused across the whole listing.

use percent_encoding::percent_decode_str;
use regex::Regex;
use std::fmt::Write as _;
use std::sync::LazyLock;

use crate::config::{OwnerLabel, DESKTOP_FLOW_CATEGORY};
use crate::core::pagination::{Cursor, PagingInfo};

/// Alias of the joined owner entity; linked columns come back as `owner.<column>`
pub const OWNER_ALIAS: &str = "owner";

/// `attribute = value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub attribute: String,
    pub value: String,
}

/// An inner-joined entity, `to` on the parent matched against `from` on the link.
///
/// Parent rows without a match are excluded by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntity {
    pub name: String,
    pub from: String,
    pub to: String,
    pub alias: String,
    pub attributes: Vec<String>,
}

/// Entity query: columns, filter and joins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchQuery {
    entity: String,
    attributes: Vec<String>,
    conditions: Vec<Condition>,
    links: Vec<LinkEntity>,
}

impl FetchQuery {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            attributes: Vec::new(),
            conditions: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn select<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.extend(attributes.into_iter().map(Into::into));
        self
    }

    pub fn filter_eq(mut self, attribute: &str, value: impl ToString) -> Self {
        self.conditions.push(Condition {
            attribute: attribute.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn link(mut self, link: LinkEntity) -> Self {
        self.links.push(link);
        self
    }

    /// Desktop flows joined with their owning user.
    ///
    /// The owner join is inner, so flows whose owner is not a user (e.g. a
    /// team) are excluded by the service.
    pub fn desktop_flows(owner_label: OwnerLabel, include_modified: bool) -> Self {
        let mut columns = vec!["workflowid", "name", "clientdata"];
        if include_modified {
            columns.push("modifiedon");
        }

        FetchQuery::new("workflow")
            .select(columns)
            .filter_eq("category", DESKTOP_FLOW_CATEGORY)
            .link(LinkEntity {
                name: "systemuser".to_string(),
                from: "systemuserid".to_string(),
                to: "ownerid".to_string(),
                alias: OWNER_ALIAS.to_string(),
                attributes: vec![owner_column(owner_label).to_string()],
            })
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn links(&self) -> &[LinkEntity] {
        &self.links
    }

    /// Web API entity set name (`workflow` -> `workflows`)
    pub fn entity_set(&self) -> String {
        format!("{}s", self.entity)
    }

    /// Primary key column of the queried entity
    pub fn primary_key(&self) -> String {
        format!("{}id", self.entity)
    }

    pub fn selects(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|a| a == attribute)
    }

    /// Render the query for one page
    pub fn to_fetch_xml(&self, paging: &PagingInfo) -> String {
        let mut xml = String::new();
        let _ = write!(
            xml,
            r#"<fetch version="1.0" mapping="logical" count="{}" page="{}""#,
            paging.count, paging.page_number
        );
        if paging.return_total_record_count {
            xml.push_str(r#" returntotalrecordcount="true""#);
        }
        if let Some(cookie) = paging.cursor.as_ref().map(paging_cookie) {
            let _ = write!(xml, r#" paging-cookie="{}""#, xml_escape(&cookie));
        }
        xml.push('>');

        let _ = write!(xml, r#"<entity name="{}">"#, xml_escape(&self.entity));
        for attribute in &self.attributes {
            let _ = write!(xml, r#"<attribute name="{}"/>"#, xml_escape(attribute));
        }
        // Stable order keeps the paging cookie meaningful between pages
        let _ = write!(xml, r#"<order attribute="{}"/>"#, xml_escape(&self.primary_key()));

        if !self.conditions.is_empty() {
            xml.push_str(r#"<filter type="and">"#);
            for condition in &self.conditions {
                let _ = write!(
                    xml,
                    r#"<condition attribute="{}" operator="eq" value="{}"/>"#,
                    xml_escape(&condition.attribute),
                    xml_escape(&condition.value)
                );
            }
            xml.push_str("</filter>");
        }

        for link in &self.links {
            let _ = write!(
                xml,
                r#"<link-entity name="{}" from="{}" to="{}" alias="{}" link-type="inner">"#,
                xml_escape(&link.name),
                xml_escape(&link.from),
                xml_escape(&link.to),
                xml_escape(&link.alias)
            );
            for attribute in &link.attributes {
                let _ = write!(xml, r#"<attribute name="{}"/>"#, xml_escape(attribute));
            }
            xml.push_str("</link-entity>");
        }

        xml.push_str("</entity></fetch>");
        xml
    }
}

/// Column of `systemuser` that labels a row
pub fn owner_column(label: OwnerLabel) -> &'static str {
    match label {
        OwnerLabel::Email => "internalemailaddress",
        OwnerLabel::Name => "fullname",
    }
}

/// Key of a linked column in a response row
pub fn linked_key(alias: &str, column: &str) -> String {
    format!("{}.{}", alias, column)
}

static PAGING_COOKIE_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"pagingcookie="([^"]*)""#).expect("static regex"));

/// Unwrap the cookie the service expects back from a cursor.
///
/// Cursors carry the `fetchxmlpagingcookie` annotation verbatim:
/// `<cookie pagenumber="2" pagingcookie="%253ccookie..." istracking="False" />`.
/// The inner attribute is URL-encoded twice. Anything else is passed through.
fn paging_cookie(cursor: &Cursor) -> String {
    match PAGING_COOKIE_ATTR.captures(cursor.as_str()) {
        Some(caps) => percent_decode(&percent_decode(&caps[1])),
        None => cursor.as_str().to_string(),
    }
}

fn percent_decode(input: &str) -> String {
    percent_decode_str(input).decode_utf8_lossy().into_owned()
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
