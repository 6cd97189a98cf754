use std::iter;
use std::sync::Arc;

use tracing::{trace, warn};
use xmpp_parsers::minidom::{Element, NSChoice};
use xmpp_parsers::ns;

use ignore_groups_core::{IGNORE_GROUPS_SETTING, SessionId, SettingsSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    /// Not a roster query, or the session does not ignore groups. The
    /// stanza was not touched.
    Unchanged,
    /// Groups were stripped. `removed_groups` may be zero when the roster
    /// carried none.
    Mutated { removed_groups: usize },
}

impl FilterOutcome {
    pub fn removed_groups(&self) -> usize {
        match self {
            FilterOutcome::Unchanged => 0,
            FilterOutcome::Mutated { removed_groups } => *removed_groups,
        }
    }

    pub fn is_mutated(&self) -> bool {
        matches!(self, FilterOutcome::Mutated { .. })
    }
}

/// Removes server-assigned `<group/>` elements from roster items for
/// sessions that have `ignore_groups` enabled.
///
/// The option is read once per stanza, at call time. A session the settings
/// source cannot resolve is treated as having the option off.
#[derive(Clone)]
pub struct RosterGroupFilter {
    settings: Arc<dyn SettingsSource>,
}

impl RosterGroupFilter {
    pub fn new(settings: Arc<dyn SettingsSource>) -> Self {
        Self { settings }
    }

    /// Filter a whole `<iq/>` element. Only the first `<query/>` child is
    /// considered, and only when its namespace is exactly `jabber:iq:roster`.
    pub fn filter(&self, iq: &mut Element, session: &SessionId) -> FilterOutcome {
        let Some(query) = iq.get_child_mut("query", NSChoice::Any) else {
            return FilterOutcome::Unchanged;
        };
        self.filter_query(query, session)
    }

    /// Filter an element that should be the roster `<query/>` itself, as
    /// found in a parsed IQ payload.
    pub fn filter_query(&self, query: &mut Element, session: &SessionId) -> FilterOutcome {
        if !query.is("query", ns::ROSTER) {
            return FilterOutcome::Unchanged;
        }

        if !self.ignore_groups(session) {
            return FilterOutcome::Unchanged;
        }

        let removed_groups: usize = query
            .children_mut()
            .filter(|child| child.name() == "item")
            .map(strip_groups)
            .sum();

        FilterOutcome::Mutated { removed_groups }
    }

    fn ignore_groups(&self, session: &SessionId) -> bool {
        match self.settings.get_bool(session, IGNORE_GROUPS_SETTING) {
            Ok(value) => value.unwrap_or(false),
            Err(error) => {
                warn!(
                    session = %session,
                    %error,
                    "account options unavailable, keeping roster groups"
                );
                false
            }
        }
    }
}

fn strip_groups(item: &mut Element) -> usize {
    let detached: Vec<Element> =
        iter::from_fn(|| item.remove_child("group", NSChoice::Any)).collect();

    for group in &detached {
        trace!(
            jid = item.attr("jid").unwrap_or_default(),
            group = %group.text(),
            "dropping roster group"
        );
    }

    detached.len()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use assert_matches::assert_matches;
    use ignore_groups_core::{MockSettingsSource, SessionSettings, SettingsError};
    use tracing_test::traced_test;

    use super::*;

    const ROSTER_WITH_GROUP: &str = "<iq xmlns='jabber:client' type=\"result\"><query xmlns=\"jabber:iq:roster\"><item jid=\"a@b.com\"><group>Friends</group></item></query></iq>";
    const ROSTER_WITHOUT_GROUP: &str = "<iq xmlns='jabber:client' type=\"result\"><query xmlns=\"jabber:iq:roster\"><item jid=\"a@b.com\"/></query></iq>";
    const OTHER_NS_WITH_GROUP: &str = "<iq xmlns='jabber:client' type=\"result\"><query xmlns=\"some:other:ns\"><item jid=\"a@b.com\"><group>Friends</group></item></query></iq>";

    fn session() -> SessionId {
        SessionId::from("alice@example.com")
    }

    fn element(xml: &str) -> Element {
        Element::from_str(xml).expect("test XML should parse")
    }

    fn to_bytes(element: &Element) -> Vec<u8> {
        let mut out = Vec::new();
        element.write_to(&mut out).expect("element should serialize");
        out
    }

    fn filter_with(ignore_groups: bool) -> RosterGroupFilter {
        let settings = SessionSettings::new();
        settings.set_bool(&session(), IGNORE_GROUPS_SETTING, ignore_groups);
        RosterGroupFilter::new(Arc::new(settings))
    }

    fn group_names(iq: &Element) -> Vec<String> {
        iq.children()
            .flat_map(|query| query.children())
            .flat_map(|item| item.children())
            .filter(|child| child.name() == "group")
            .map(Element::text)
            .collect()
    }

    #[test]
    fn strips_single_group_when_enabled() {
        let mut iq = element(ROSTER_WITH_GROUP);

        let outcome = filter_with(true).filter(&mut iq, &session());

        assert_eq!(outcome, FilterOutcome::Mutated { removed_groups: 1 });
        let expected = element(ROSTER_WITHOUT_GROUP);
        assert_eq!(iq, expected);
        assert_eq!(to_bytes(&iq), to_bytes(&expected));
    }

    #[test]
    fn leaves_stanza_byte_identical_when_disabled() {
        let mut iq = element(ROSTER_WITH_GROUP);
        let before = to_bytes(&iq);

        let outcome = filter_with(false).filter(&mut iq, &session());

        assert_eq!(outcome, FilterOutcome::Unchanged);
        assert_eq!(outcome.removed_groups(), 0);
        assert_eq!(to_bytes(&iq), before);
    }

    #[test]
    fn ignores_query_in_other_namespace() {
        let mut iq = element(OTHER_NS_WITH_GROUP);
        let before = iq.clone();

        let outcome = filter_with(true).filter(&mut iq, &session());

        assert_eq!(outcome, FilterOutcome::Unchanged);
        assert_eq!(to_bytes(&iq), to_bytes(&before));
    }

    #[test]
    fn removes_every_group_and_keeps_item_attributes() {
        let mut iq = element(
            "<iq xmlns='jabber:client' type='result'><query xmlns='jabber:iq:roster'>\
             <item jid='a@b.com' name='A' subscription='both'><group>Friends</group><group>Work</group></item>\
             </query></iq>",
        );

        let outcome = filter_with(true).filter(&mut iq, &session());

        assert_eq!(outcome, FilterOutcome::Mutated { removed_groups: 2 });
        let item = iq
            .get_child("query", ns::ROSTER)
            .and_then(|query| query.get_child("item", ns::ROSTER))
            .expect("item should survive");
        assert_eq!(item.attr("jid"), Some("a@b.com"));
        assert_eq!(item.attr("name"), Some("A"));
        assert_eq!(item.attr("subscription"), Some("both"));
        assert_eq!(item.children().count(), 0);
    }

    #[test]
    fn keeps_item_order_and_non_group_children() {
        let mut iq = element(
            "<iq xmlns='jabber:client' type='set'><query xmlns='jabber:iq:roster'>\
             <item jid='one@b.com'><group>A</group></item>\
             <item jid='two@b.com'><group>B</group><note xmlns='urn:example:note'>keep</note><group>C</group></item>\
             <item jid='three@b.com'/>\
             </query></iq>",
        );

        let outcome = filter_with(true).filter(&mut iq, &session());
        assert_eq!(outcome.removed_groups(), 3);

        let query = iq.get_child("query", ns::ROSTER).expect("query");
        let jids: Vec<&str> = query
            .children()
            .filter_map(|item| item.attr("jid"))
            .collect();
        assert_eq!(jids, vec!["one@b.com", "two@b.com", "three@b.com"]);

        let second = query.children().nth(1).expect("second item");
        let kept: Vec<&str> = second.children().map(Element::name).collect();
        assert_eq!(kept, vec!["note"]);
        assert!(group_names(&iq).is_empty());
    }

    #[test]
    fn deletes_groups_with_nested_content() {
        let mut iq = element(
            "<iq xmlns='jabber:client' type='result'><query xmlns='jabber:iq:roster'>\
             <item jid='a@b.com'><group>Team<extra xmlns='urn:example'>x</extra></group></item>\
             </query></iq>",
        );

        let outcome = filter_with(true).filter(&mut iq, &session());

        assert_eq!(outcome, FilterOutcome::Mutated { removed_groups: 1 });
        assert!(group_names(&iq).is_empty());
    }

    #[test]
    fn second_pass_removes_nothing() {
        let filter = filter_with(true);
        let mut iq = element(ROSTER_WITH_GROUP);

        assert_eq!(filter.filter(&mut iq, &session()).removed_groups(), 1);
        let once = iq.clone();

        let outcome = filter.filter(&mut iq, &session());
        assert_eq!(outcome, FilterOutcome::Mutated { removed_groups: 0 });
        assert_eq!(to_bytes(&iq), to_bytes(&once));
    }

    #[test]
    fn iq_without_query_is_unchanged() {
        let mut iq = element(
            "<iq xmlns='jabber:client' type='result'><ping xmlns='urn:xmpp:ping'/></iq>",
        );
        let before = iq.clone();

        assert_eq!(
            filter_with(true).filter(&mut iq, &session()),
            FilterOutcome::Unchanged
        );
        assert_eq!(to_bytes(&iq), to_bytes(&before));
    }

    #[test]
    fn only_first_query_child_is_considered() {
        let mut iq = element(
            "<iq xmlns='jabber:client' type='result'>\
             <query xmlns='http://jabber.org/protocol/disco#info'/>\
             <query xmlns='jabber:iq:roster'><item jid='a@b.com'><group>Friends</group></item></query>\
             </iq>",
        );
        let before = iq.clone();

        assert_eq!(
            filter_with(true).filter(&mut iq, &session()),
            FilterOutcome::Unchanged
        );
        assert_eq!(to_bytes(&iq), to_bytes(&before));
    }

    #[test]
    fn unset_option_defaults_to_keeping_groups() {
        let settings = SessionSettings::new();
        settings.open_session(session());
        let filter = RosterGroupFilter::new(Arc::new(settings));
        let mut iq = element(ROSTER_WITH_GROUP);

        assert_eq!(filter.filter(&mut iq, &session()), FilterOutcome::Unchanged);
        assert_eq!(group_names(&iq), vec!["Friends".to_string()]);
    }

    #[test]
    #[traced_test]
    fn unresolvable_session_keeps_groups_and_warns() {
        let filter = RosterGroupFilter::new(Arc::new(SessionSettings::new()));
        let mut iq = element(ROSTER_WITH_GROUP);

        let outcome = filter.filter(&mut iq, &session());

        assert_eq!(outcome, FilterOutcome::Unchanged);
        assert_eq!(group_names(&iq), vec!["Friends".to_string()]);
        assert!(logs_contain("account options unavailable"));
    }

    #[test]
    fn reads_option_once_per_stanza() {
        let mut settings = MockSettingsSource::new();
        settings
            .expect_get_bool()
            .withf(|session, key| session.as_str() == "alice@example.com" && key == IGNORE_GROUPS_SETTING)
            .times(1)
            .returning(|_, _| Ok(Some(true)));
        let filter = RosterGroupFilter::new(Arc::new(settings));
        let mut iq = element(
            "<iq xmlns='jabber:client' type='result'><query xmlns='jabber:iq:roster'>\
             <item jid='one@b.com'><group>A</group></item>\
             <item jid='two@b.com'><group>B</group></item>\
             </query></iq>",
        );

        assert_eq!(filter.filter(&mut iq, &session()).removed_groups(), 2);
    }

    #[test]
    fn does_not_consult_settings_for_foreign_queries() {
        let mut settings = MockSettingsSource::new();
        settings.expect_get_bool().never();
        let filter = RosterGroupFilter::new(Arc::new(settings));
        let mut iq = element(OTHER_NS_WITH_GROUP);

        assert_eq!(filter.filter(&mut iq, &session()), FilterOutcome::Unchanged);
    }

    #[test]
    fn settings_error_is_treated_as_disabled() {
        let mut settings = MockSettingsSource::new();
        settings
            .expect_get_bool()
            .returning(|_, _| Err(SettingsError::Unavailable("store closed".to_string())));
        let filter = RosterGroupFilter::new(Arc::new(settings));
        let mut iq = element(ROSTER_WITH_GROUP);

        assert_matches!(filter.filter(&mut iq, &session()), FilterOutcome::Unchanged);
        assert_eq!(group_names(&iq).len(), 1);
    }
}
