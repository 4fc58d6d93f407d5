use crate::pipeline::gadget::Gadget;
use crate::{Error, Result};

/// A named stage slot; the chain takes exclusive ownership of the
/// stage once added.
struct StageHandle {
    id: String,
    gadget: Box<dyn Gadget>,
}

/// Ordered description of the remote processing chain.
///
/// Stages serialize grouped by role, readers first, then writers, then
/// intermediate gadgets in registration order, then the single
/// terminator. Serialization requires a terminator.
#[derive(Default)]
pub struct PipelineChain {
    readers: Vec<StageHandle>,
    writers: Vec<StageHandle>,
    gadgets: Vec<StageHandle>,
    terminator: Option<Box<dyn Gadget>>,
}

const ENVELOPE_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<gadgetronStreamConfiguration xsi:schemaLocation=\"http://gadgetron.sf.net/gadgetron gadgetron.xsd\"\n\
xmlns=\"http://gadgetron.sf.net/gadgetron\"\n\
xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">\n\n";

impl PipelineChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_reader(&mut self, id: impl Into<String>, gadget: Box<dyn Gadget>) -> Result<()> {
        Self::add_to_role(&mut self.readers, "reader", id.into(), gadget)
    }

    pub fn add_writer(&mut self, id: impl Into<String>, gadget: Box<dyn Gadget>) -> Result<()> {
        Self::add_to_role(&mut self.writers, "writer", id.into(), gadget)
    }

    pub fn add_gadget(&mut self, id: impl Into<String>, gadget: Box<dyn Gadget>) -> Result<()> {
        Self::add_to_role(&mut self.gadgets, "gadget", id.into(), gadget)
    }

    /// Replaces any previously set terminator.
    pub fn set_terminator(&mut self, gadget: Box<dyn Gadget>) {
        self.terminator = Some(gadget);
    }

    // Ids may repeat across roles but not within one; a repeat within
    // a role is a wiring mistake and fails before any network traffic.
    fn add_to_role(
        role: &mut Vec<StageHandle>,
        role_name: &str,
        id: String,
        gadget: Box<dyn Gadget>,
    ) -> Result<()> {
        if role.iter().any(|handle| handle.id == id) {
            return Err(Error::Configuration(format!(
                "duplicate {role_name} stage id `{id}`"
            )));
        }
        role.push(StageHandle { id, gadget });
        Ok(())
    }

    /// Serializes the chain into the configuration document the remote
    /// engine instantiates.
    pub fn serialize(&self) -> Result<String> {
        let terminator = self.terminator.as_ref().ok_or_else(|| {
            Error::Configuration("pipeline chain serialized without a terminator".into())
        })?;

        let mut document = String::from(ENVELOPE_HEADER);
        for handle in self.readers.iter().chain(&self.writers).chain(&self.gadgets) {
            document.push_str(&handle.gadget.xml());
            document.push('\n');
        }
        document.push_str(&terminator.xml());
        document.push('\n');
        document.push_str("</gadgetronStreamConfiguration>\n");
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::gadget::{acquisition_finish, GadgetStage, ReaderStage, WriterStage};

    #[test]
    fn serialization_groups_roles_regardless_of_call_order() {
        let mut chain = PipelineChain::new();
        chain
            .add_gadget("a", Box::new(GadgetStage::new("A", "dll", "StageA")))
            .unwrap();
        chain
            .add_reader("reader", Box::new(ReaderStage::acquisition()))
            .unwrap();
        chain
            .add_gadget("b", Box::new(GadgetStage::new("B", "dll", "StageB")))
            .unwrap();
        chain
            .add_writer("writer", Box::new(WriterStage::acquisition()))
            .unwrap();
        chain.set_terminator(Box::new(acquisition_finish()));

        let document = chain.serialize().unwrap();
        let positions: Vec<usize> = [
            "<reader>",
            "<writer>",
            "StageA",
            "StageB",
            "AcquisitionFinishGadget",
        ]
        .iter()
        .map(|needle| document.find(needle).expect(needle))
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(document.starts_with("<?xml version=\"1.0\""));
        assert!(document.ends_with("</gadgetronStreamConfiguration>\n"));
    }

    #[test]
    fn missing_terminator_is_a_configuration_error() {
        let mut chain = PipelineChain::new();
        chain
            .add_reader("reader", Box::new(ReaderStage::acquisition()))
            .unwrap();
        assert!(matches!(
            chain.serialize(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn duplicate_id_within_a_role_is_rejected() {
        let mut chain = PipelineChain::new();
        chain
            .add_gadget("stage", Box::new(GadgetStage::new("A", "dll", "StageA")))
            .unwrap();
        let err = chain
            .add_gadget("stage", Box::new(GadgetStage::new("B", "dll", "StageB")))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("stage"));
    }

    #[test]
    fn same_id_in_different_roles_is_allowed() {
        let mut chain = PipelineChain::new();
        chain
            .add_reader("io", Box::new(ReaderStage::acquisition()))
            .unwrap();
        chain
            .add_writer("io", Box::new(WriterStage::acquisition()))
            .unwrap();
        chain.set_terminator(Box::new(acquisition_finish()));
        assert!(chain.serialize().is_ok());
    }

    #[test]
    fn terminator_replacement_keeps_the_last_one() {
        let mut chain = PipelineChain::new();
        chain.set_terminator(Box::new(GadgetStage::new("old", "dll", "OldFinish")));
        chain.set_terminator(Box::new(acquisition_finish()));
        let document = chain.serialize().unwrap();
        assert!(!document.contains("OldFinish"));
        assert!(document.contains("AcquisitionFinishGadget"));
    }
}
