use crate::models::{Listing, Provider};

/// Target type a captured string is coerced into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Decimal,
}

/// Listing fields that extraction rules can populate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Address,
    PropertyType,
    Price,
    Bed,
    Bath,
    Hoa,
    LandLease,
    Area,
    AreaUnit,
    Year,
    Commute,
    ListingAge,
    ListingAgent,
    ListingAgentBrokerage,
}

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Field::Address => "address",
            Field::PropertyType => "property_type",
            Field::Price => "price",
            Field::Bed => "bed",
            Field::Bath => "bath",
            Field::Hoa => "hoa",
            Field::LandLease => "land_lease",
            Field::Area => "area",
            Field::AreaUnit => "area_unit",
            Field::Year => "year",
            Field::Commute => "commute",
            Field::ListingAge => "listing_age",
            Field::ListingAgent => "listing_agent",
            Field::ListingAgentBrokerage => "listing_agent_brokerage",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Field::Address
            | Field::PropertyType
            | Field::AreaUnit
            | Field::Commute
            | Field::ListingAgent
            | Field::ListingAgentBrokerage => FieldKind::Text,
            Field::Bed | Field::Bath | Field::Year | Field::ListingAge => FieldKind::Integer,
            Field::Price | Field::Hoa | Field::LandLease | Field::Area => FieldKind::Decimal,
        }
    }
}

/// A coerced field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Decimal(f64),
}

impl Listing {
    /// Store a coerced value. Kind mismatches leave the field untouched.
    pub fn set_field(&mut self, field: Field, value: FieldValue) {
        match (field, value) {
            (Field::Address, FieldValue::Text(v)) => self.address = v,
            (Field::PropertyType, FieldValue::Text(v)) => self.property_type = v,
            (Field::AreaUnit, FieldValue::Text(v)) => self.area_unit = v,
            (Field::Commute, FieldValue::Text(v)) => self.commute = v,
            (Field::ListingAgent, FieldValue::Text(v)) => self.listing_agent = v,
            (Field::ListingAgentBrokerage, FieldValue::Text(v)) => self.listing_agent_brokerage = v,
            (Field::Bed, FieldValue::Integer(v)) => self.bed = v,
            (Field::Bath, FieldValue::Integer(v)) => self.bath = v,
            (Field::Year, FieldValue::Integer(v)) => self.year = v,
            (Field::ListingAge, FieldValue::Integer(v)) => self.listing_age = v,
            (Field::Price, FieldValue::Decimal(v)) => self.price = v,
            (Field::Hoa, FieldValue::Decimal(v)) => self.hoa = v,
            (Field::LandLease, FieldValue::Decimal(v)) => self.land_lease = v,
            (Field::Area, FieldValue::Decimal(v)) => self.area = v,
            _ => {}
        }
    }
}

/// Regex flags a rule compiles with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuleFlags {
    pub multi_line: bool,
    pub case_insensitive: bool,
}

impl RuleFlags {
    pub const NONE: Self = Self {
        multi_line: false,
        case_insensitive: false,
    };
    pub const MULTI_LINE: Self = Self {
        multi_line: true,
        case_insensitive: false,
    };
    pub const IGNORE_CASE: Self = Self {
        multi_line: false,
        case_insensitive: true,
    };
    pub const MULTI_LINE_IGNORE_CASE: Self = Self {
        multi_line: true,
        case_insensitive: true,
    };
}

/// How one field is pulled out of a provider's page text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractionRule {
    pub field: Field,
    pub pattern: &'static str,
    pub flags: RuleFlags,
    /// Capture group holding the value
    pub group: usize,
}

const fn rule(field: Field, pattern: &'static str, flags: RuleFlags) -> ExtractionRule {
    ExtractionRule {
        field,
        pattern,
        flags,
        group: 1,
    }
}

const REALTOR_RULES: &[ExtractionRule] = &[
    rule(Field::Address, r"\n\s*(.+, .+, [A-Z]{2} \d{5})", RuleFlags::MULTI_LINE),
    rule(Field::PropertyType, r"Property type\n(.+)\n", RuleFlags::MULTI_LINE),
    rule(Field::Price, r"\n\s*\$([\d,]{5,})", RuleFlags::MULTI_LINE),
    rule(Field::Bed, r"(\d+)\n\s*bed", RuleFlags::MULTI_LINE),
    rule(Field::Bath, r"(\d+)\n\s*bath", RuleFlags::MULTI_LINE),
    rule(Field::Hoa, r"HOA fees\n\$?([\d.,]{3,})", RuleFlags::MULTI_LINE),
    rule(
        Field::LandLease,
        r"(?:land lease|rent)[^\d]+\$?([\d., ]{3,})[^\d]",
        RuleFlags::MULTI_LINE_IGNORE_CASE,
    ),
    rule(Field::Area, r"([\d.,]{3,}) (square foot lot|acre lot|square feet)", RuleFlags::MULTI_LINE),
    rule(Field::AreaUnit, r"[\d.,]{3,} (square foot lot|acre lot|square feet)", RuleFlags::MULTI_LINE),
    rule(Field::Year, r"Year built\n(.+)", RuleFlags::MULTI_LINE),
    rule(Field::Commute, r"(\d+ min)\nto", RuleFlags::MULTI_LINE),
    rule(Field::ListingAge, r"On Realtor\.com\n(\d+) days", RuleFlags::MULTI_LINE),
    rule(Field::ListingAgent, r"Listed by (.+)", RuleFlags::NONE),
    rule(Field::ListingAgentBrokerage, r"Brokered by (.+)", RuleFlags::NONE),
];

const ZILLOW_RULES: &[ExtractionRule] = &[
    rule(Field::Address, r"\n\s*(.+, .+, [A-Z]{2} \d{5})", RuleFlags::MULTI_LINE),
    rule(Field::PropertyType, r"Home type:\s*(.+)\n", RuleFlags::MULTI_LINE),
    rule(Field::Price, r"\n\s*\$([\d,]{5,})", RuleFlags::MULTI_LINE),
    rule(Field::Bed, r"(\d+)\s*bed", RuleFlags::MULTI_LINE),
    rule(Field::Bath, r"(\d+)\s*bath", RuleFlags::MULTI_LINE),
    rule(Field::Hoa, r"\$?([\d.,]{3,})/mo HOA", RuleFlags::NONE),
    rule(Field::LandLease, r"(?:lease amount|rent):+\s*\$?([\d., ]{3,})", RuleFlags::IGNORE_CASE),
    rule(Field::Area, r"area:\s*([\d.,]{3,})", RuleFlags::MULTI_LINE),
    rule(Field::AreaUnit, r"area:\s*[\d.,]{3,} (sqft lot|acre lot|sqft)", RuleFlags::MULTI_LINE),
    rule(Field::Year, r"Year built:\s*(.+)", RuleFlags::MULTI_LINE),
    rule(Field::Commute, r"(\d+ min)\nto", RuleFlags::MULTI_LINE),
    rule(Field::ListingAge, r"(\d+) days on Zillow", RuleFlags::MULTI_LINE),
    rule(
        Field::ListingAgent,
        r"Listed by:\n([^\d]+)\s+[\d \-]+,\n(?:.+)\s+[\d\-()]{9,}",
        RuleFlags::MULTI_LINE,
    ),
    rule(
        Field::ListingAgentBrokerage,
        r"Listed by:\n(?:[^\d]+)\s+[\d \-]+,\n(.+)\s+[\d\-()]{9,}",
        RuleFlags::MULTI_LINE,
    ),
];

/// Ordered rule table for a provider
pub fn rules_for(provider: Provider) -> &'static [ExtractionRule] {
    match provider {
        Provider::Realtor => REALTOR_RULES,
        Provider::Zillow => ZILLOW_RULES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_field_has_one_rule_per_provider() {
        for provider in Provider::ALL {
            let fields: HashSet<Field> = rules_for(provider).iter().map(|r| r.field).collect();
            assert_eq!(fields.len(), rules_for(provider).len(), "{provider} has duplicate rules");
            assert_eq!(fields.len(), 14);
        }
    }

    #[test]
    fn set_field_ignores_kind_mismatch() {
        let mut listing = Listing::default();
        listing.set_field(Field::Bed, FieldValue::Text("three".to_string()));
        assert_eq!(listing.bed, 1);
        listing.set_field(Field::Bed, FieldValue::Integer(3));
        assert_eq!(listing.bed, 3);
    }
}
