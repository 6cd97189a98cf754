use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, trace};
use xmpp_parsers::minidom::Element;

use ignore_groups_core::SessionId;

use crate::{error::PipelineError, stanza::Stanza};

pub enum ProcessorResult {
    Continue,
    Drop,
    Replace(Box<Stanza>),
}

pub struct ProcessorContext {
    pub session: SessionId,
}

pub trait StanzaProcessor: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn process_inbound(&self, stanza: &mut Stanza, ctx: &ProcessorContext) -> ProcessorResult;
}

/// The IQ payload an interceptor subscribes to, e.g. `query` in
/// `jabber:iq:roster`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StanzaClass {
    element: String,
    namespace: String,
}

impl StanzaClass {
    pub fn new(element: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            element: element.into(),
            namespace: namespace.into(),
        }
    }

    pub fn element(&self) -> &str {
        &self.element
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn matches(&self, payload: &Element) -> bool {
        payload.is(&self.element, self.namespace.as_str())
    }
}

impl fmt::Display for StanzaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} xmlns='{}'/>", self.element, self.namespace)
    }
}

/// Registration capability handed to extensions. Implementors must release
/// every reference to the processor on `unregister`.
pub trait InterceptorRegistry: Send + Sync {
    fn register(
        &self,
        class: StanzaClass,
        processor: Arc<dyn StanzaProcessor>,
    ) -> Result<(), PipelineError>;

    fn unregister(&self, class: &StanzaClass) -> Option<Arc<dyn StanzaProcessor>>;
}

struct Registration {
    class: StanzaClass,
    processor: Arc<dyn StanzaProcessor>,
}

/// Dispatches inbound IQ `result`/`set` stanzas to the processor registered
/// for their payload class, before anything else sees them. Each class has
/// at most one processor.
pub struct StanzaPipeline {
    registrations: RwLock<Vec<Registration>>,
}

impl StanzaPipeline {
    pub fn new() -> Self {
        Self {
            registrations: RwLock::new(Vec::new()),
        }
    }

    pub fn register(
        &self,
        class: StanzaClass,
        processor: Arc<dyn StanzaProcessor>,
    ) -> Result<(), PipelineError> {
        let mut registrations = self
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if registrations.iter().any(|r| r.class == class) {
            return Err(PipelineError::AlreadyRegistered(class));
        }

        debug!(class = %class, processor = processor.name(), "interceptor registered");
        registrations.push(Registration { class, processor });
        Ok(())
    }

    pub fn unregister(&self, class: &StanzaClass) -> Option<Arc<dyn StanzaProcessor>> {
        let mut registrations = self
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let idx = registrations.iter().position(|r| &r.class == class)?;
        let removed = registrations.remove(idx);
        debug!(class = %class, processor = removed.processor.name(), "interceptor unregistered");
        Some(removed.processor)
    }

    pub fn is_registered(&self, class: &StanzaClass) -> bool {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|r| &r.class == class)
    }

    pub fn registered_classes(&self) -> Vec<StanzaClass> {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|r| r.class.clone())
            .collect()
    }

    /// Parse one inbound stanza and run it through the registered
    /// interceptors. `Ok(None)` means an interceptor dropped it.
    pub fn process_inbound(
        &self,
        raw: &[u8],
        session: &SessionId,
    ) -> Result<Option<Stanza>, PipelineError> {
        let stanza = Stanza::parse(raw)?;
        trace!(session = %session, stanza_type = stanza.name(), "inbound stanza parsed");
        Ok(self.dispatch_inbound(stanza, session))
    }

    pub fn dispatch_inbound(&self, mut stanza: Stanza, session: &SessionId) -> Option<Stanza> {
        let ctx = ProcessorContext {
            session: session.clone(),
        };

        // Snapshot so processors run without the lock held.
        let registrations: Vec<(StanzaClass, Arc<dyn StanzaProcessor>)> = self
            .registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|r| (r.class.clone(), r.processor.clone()))
            .collect();

        for (class, processor) in registrations {
            let interested = stanza
                .iq_payload()
                .is_some_and(|payload| class.matches(payload));
            if !interested {
                continue;
            }

            match processor.process_inbound(&mut stanza, &ctx) {
                ProcessorResult::Continue => {}
                ProcessorResult::Drop => {
                    debug!(
                        session = %session,
                        processor = processor.name(),
                        "inbound stanza dropped"
                    );
                    return None;
                }
                ProcessorResult::Replace(replacement) => stanza = *replacement,
            }
        }

        Some(stanza)
    }
}

impl Default for StanzaPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl InterceptorRegistry for StanzaPipeline {
    fn register(
        &self,
        class: StanzaClass,
        processor: Arc<dyn StanzaProcessor>,
    ) -> Result<(), PipelineError> {
        StanzaPipeline::register(self, class, processor)
    }

    fn unregister(&self, class: &StanzaClass) -> Option<Arc<dyn StanzaProcessor>> {
        StanzaPipeline::unregister(self, class)
    }
}
