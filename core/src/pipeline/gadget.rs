use std::fmt::Write;

/// One named remote processing unit. A stage's only capability toward
/// the client is producing its configuration-document fragment.
pub trait Gadget: Send {
    fn xml(&self) -> String;
}

/// Deserializer slot at the head of the remote chain.
pub struct ReaderStage {
    slot: u16,
    dll: String,
    classname: String,
}

impl ReaderStage {
    pub fn new(slot: u16, dll: impl Into<String>, classname: impl Into<String>) -> Self {
        Self {
            slot,
            dll: dll.into(),
            classname: classname.into(),
        }
    }

    pub fn acquisition() -> Self {
        Self::new(
            crate::client::protocol::MESSAGE_ACQUISITION,
            "gadgetron_mricore",
            "GadgetIsmrmrdAcquisitionMessageReader",
        )
    }

    pub fn image() -> Self {
        Self::new(
            crate::client::protocol::MESSAGE_IMAGE,
            "gadgetron_mricore",
            "MRIImageReader",
        )
    }
}

impl Gadget for ReaderStage {
    fn xml(&self) -> String {
        format!(
            "<reader><slot>{}</slot><dll>{}</dll><classname>{}</classname></reader>",
            self.slot, self.dll, self.classname
        )
    }
}

/// Serializer slot for results flowing back to the client.
pub struct WriterStage {
    slot: u16,
    dll: String,
    classname: String,
}

impl WriterStage {
    pub fn new(slot: u16, dll: impl Into<String>, classname: impl Into<String>) -> Self {
        Self {
            slot,
            dll: dll.into(),
            classname: classname.into(),
        }
    }

    pub fn acquisition() -> Self {
        Self::new(
            crate::client::protocol::MESSAGE_ACQUISITION,
            "gadgetron_mricore",
            "GadgetIsmrmrdAcquisitionMessageWriter",
        )
    }

    pub fn image() -> Self {
        Self::new(
            crate::client::protocol::MESSAGE_IMAGE,
            "gadgetron_mricore",
            "MRIImageWriter",
        )
    }
}

impl Gadget for WriterStage {
    fn xml(&self) -> String {
        format!(
            "<writer><slot>{}</slot><dll>{}</dll><classname>{}</classname></writer>",
            self.slot, self.dll, self.classname
        )
    }
}

/// Intermediate or terminating processing stage, with optional
/// key/value properties emitted in insertion order.
pub struct GadgetStage {
    name: String,
    dll: String,
    classname: String,
    properties: Vec<(String, String)>,
}

impl GadgetStage {
    pub fn new(
        name: impl Into<String>,
        dll: impl Into<String>,
        classname: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            dll: dll.into(),
            classname: classname.into(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((name.into(), value.into()));
        self
    }
}

impl Gadget for GadgetStage {
    fn xml(&self) -> String {
        let mut fragment = format!(
            "<gadget><name>{}</name><dll>{}</dll><classname>{}</classname>",
            self.name, self.dll, self.classname
        );
        for (name, value) in &self.properties {
            let _ = write!(
                fragment,
                "<property><name>{name}</name><value>{value}</value></property>"
            );
        }
        fragment.push_str("</gadget>");
        fragment
    }
}

/// Terminator that finishes an acquisition-passthrough chain.
pub fn acquisition_finish() -> GadgetStage {
    GadgetStage::new("acq_finish", "gadgetron_mricore", "AcquisitionFinishGadget")
}

/// Terminator that finishes an image-producing chain.
pub fn image_finish() -> GadgetStage {
    GadgetStage::new("img_finish", "gadgetron_mricore", "ImageFinishGadget")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_fragment_carries_its_slot() {
        let xml = ReaderStage::acquisition().xml();
        assert!(xml.starts_with("<reader><slot>1008</slot>"));
        assert!(xml.contains("GadgetIsmrmrdAcquisitionMessageReader"));
    }

    #[test]
    fn gadget_properties_keep_insertion_order() {
        let xml = GadgetStage::new("recon", "gadgetron_mricore", "SimpleReconGadget")
            .with_property("discard_warmup", "true")
            .with_property("slices", "1")
            .xml();
        let first = xml.find("discard_warmup").unwrap();
        let second = xml.find("slices").unwrap();
        assert!(first < second);
    }
}
