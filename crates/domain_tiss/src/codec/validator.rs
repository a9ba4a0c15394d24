//! Structural validation of TISS documents
//!
//! # Rules
//!
//! ## Document
//! - Content must not be empty and must be well-formed
//! - Root element is `tissLoteGuias` with `cabecalho`, `guias` and `rodape`
//! - `cabecalho` carries `identificacaoTransacao`, `origem`, `destino`, `versaoPadrao`
//! - `guias` holds at least one guide
//! - `rodape` carries `quantidadeGuias` and `valorTotal`
//!
//! ## Guides
//! - Element name must be a known guide type
//! - Common sections plus the sections of the guide's type must be present
//!
//! ## Warnings only
//! - Missing XML declaration
//! - Standard version other than the configured one
//! - Footer count or total that does not match the body
//! - Reference schema not available locally

use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

use super::tree::{self, Node};
use super::{TissCodec, XmlValidationResult, HEADER_ELEMENTS, HEADER_SECTIONS, ROOT_ELEMENT};
use crate::guide::GuideType;

impl TissCodec {
    /// Checks the structure of a full batch document
    pub fn validate_structure(&self, xml: &str) -> XmlValidationResult {
        if xml.trim().is_empty() {
            return XmlValidationResult::fail("XML content is empty");
        }
        let document = match tree::parse(xml) {
            Ok(document) => document,
            Err(reason) => return XmlValidationResult::fail(format!("XML is not well-formed: {}", reason)),
        };

        let mut result = XmlValidationResult::ok();
        if !document.has_declaration {
            result.add_warning("XML declaration is missing");
        }
        self.check_schema_artifact(&mut result);

        let root = &document.root;
        if root.name != ROOT_ELEMENT {
            result.add_error(format!(
                "Root element must be {}, found {}",
                ROOT_ELEMENT, root.name
            ));
            return result;
        }
        for section in HEADER_SECTIONS {
            if !root.has_child(section) {
                result.add_error(format!("Missing required section: {}", section));
            }
        }

        if let Some(header) = root.child("cabecalho") {
            self.check_header(header, &mut result);
        }
        let guide_count = root.child("guias").map(|guides| {
            check_guides(guides, &mut result);
            guides.children.len()
        });
        if let Some(footer) = root.child("rodape") {
            check_footer(footer, guide_count, &mut result);
        }

        debug!(
            valid = result.is_valid,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "TISS XML validated"
        );
        result
    }

    /// Checks a single guide element such as `<guiaConsulta>...</guiaConsulta>`
    pub fn validate_guide(&self, fragment: &str) -> XmlValidationResult {
        if fragment.trim().is_empty() {
            return XmlValidationResult::fail("XML content is empty");
        }
        match tree::parse(fragment) {
            Ok(document) => {
                let mut result = XmlValidationResult::ok();
                check_guide(&document.root, None, &mut result);
                result
            }
            Err(reason) => XmlValidationResult::fail(format!("XML is not well-formed: {}", reason)),
        }
    }

    fn check_header(&self, header: &Node, result: &mut XmlValidationResult) {
        for element in HEADER_ELEMENTS {
            if !header.has_child(element) {
                result.add_error(format!("Missing required element: cabecalho/{}", element));
            }
        }
        if let Some(version) = header.child("versaoPadrao") {
            let version = version.text.trim();
            if version.is_empty() {
                result.add_warning("Standard version is empty");
            } else if version != self.config.standard_version {
                result.add_warning(format!(
                    "Unsupported standard version {} (expected {})",
                    version, self.config.standard_version
                ));
            }
        }
    }

    fn check_schema_artifact(&self, result: &mut XmlValidationResult) {
        match self.config.schema_path() {
            Some(path) if path.is_file() => {}
            Some(path) => result.add_warning(format!(
                "Reference schema {} not found; schema validation skipped",
                path.display()
            )),
            None => result.add_warning("No reference schema directory configured; schema validation skipped"),
        }
    }
}

fn check_guides(guides: &Node, result: &mut XmlValidationResult) {
    if guides.children.is_empty() {
        result.add_error("Batch must contain at least one guide");
        return;
    }
    for (index, guide) in guides.children.iter().enumerate() {
        check_guide(guide, Some(index + 1), result);
    }
}

fn check_guide(guide: &Node, position: Option<usize>, result: &mut XmlValidationResult) {
    let label = match position {
        Some(position) => format!("Guide #{} ({})", position, guide.name),
        None => format!("Guide ({})", guide.name),
    };
    let Some(guide_type) = GuideType::from_element_name(&guide.name).into_iter().next() else {
        result.add_error(format!("{}: unrecognized guide element", label));
        return;
    };
    for section in guide_type.required_sections() {
        if !guide.has_child(section) {
            result.add_error(format!("{}: missing required section {}", label, section));
        }
    }
}

fn check_footer(footer: &Node, guide_count: Option<usize>, result: &mut XmlValidationResult) {
    match footer.child("quantidadeGuias") {
        None => result.add_error("Missing required element: rodape/quantidadeGuias"),
        Some(count) => match (count.text.trim().parse::<usize>(), guide_count) {
            (Ok(declared), Some(actual)) if declared != actual => result.add_warning(format!(
                "Footer declares {} guides but the body contains {}",
                declared, actual
            )),
            (Err(_), _) => result.add_warning(format!(
                "Footer guide count '{}' is not a number",
                count.text.trim()
            )),
            _ => {}
        },
    }
    match footer.child("valorTotal") {
        None => result.add_error("Missing required element: rodape/valorTotal"),
        Some(total) if Decimal::from_str(total.text.trim()).is_err() => result.add_warning(format!(
            "Footer total '{}' is not a decimal value",
            total.text.trim()
        )),
        Some(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecConfig;

    const VALID: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tissLoteGuias>
  <cabecalho>
    <identificacaoTransacao><tipoTransacao>ENVIO_LOTE_GUIAS</tipoTransacao></identificacaoTransacao>
    <origem/>
    <destino/>
    <versaoPadrao>4.02.00</versaoPadrao>
  </cabecalho>
  <guias>
    <guiaConsulta>
      <cabecalhoGuia/>
      <dadosBeneficiario/>
      <dadosAtendimento/>
    </guiaConsulta>
  </guias>
  <rodape>
    <quantidadeGuias>1</quantidadeGuias>
    <valorTotal>100.00</valorTotal>
  </rodape>
</tissLoteGuias>"#;

    fn codec() -> TissCodec {
        TissCodec::new(CodecConfig::default())
    }

    #[test]
    fn test_valid_document() {
        let result = codec().validate_structure(VALID);
        assert!(result.is_valid, "{:?}", result.errors);
        assert!(result.errors.is_empty());
        // no schema directory configured
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_empty_and_malformed() {
        assert!(!codec().validate_structure("   ").is_valid);
        let result = codec().validate_structure("<tissLoteGuias><cabecalho>");
        assert!(result.errors[0].contains("not well-formed"));
    }

    #[test]
    fn test_missing_sections_reported_individually() {
        let result = codec().validate_structure("<?xml version=\"1.0\"?><tissLoteGuias/>");
        assert_eq!(result.errors.len(), 3);
        assert!(result.errors.iter().any(|e| e.contains("rodape")));
    }

    #[test]
    fn test_wrong_root() {
        let result = codec().validate_structure("<?xml version=\"1.0\"?><lote/>");
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("tissLoteGuias"));
    }

    #[test]
    fn test_empty_guides() {
        let xml = VALID.replace(
            "<guiaConsulta>\n      <cabecalhoGuia/>\n      <dadosBeneficiario/>\n      <dadosAtendimento/>\n    </guiaConsulta>",
            "",
        );
        let result = codec().validate_structure(&xml);
        assert!(result.errors.iter().any(|e| e.contains("at least one guide")));
    }

    #[test]
    fn test_version_and_declaration_are_warnings() {
        let xml = VALID
            .replace(r#"<?xml version="1.0" encoding="UTF-8"?>"#, "")
            .replace("4.02.00", "3.05.00");
        let result = codec().validate_structure(&xml);
        assert!(result.is_valid);
        assert!(result.warnings.iter().any(|w| w.contains("declaration")));
        assert!(result.warnings.iter().any(|w| w.contains("3.05.00")));
    }

    #[test]
    fn test_footer_mismatch_is_warning() {
        let xml = VALID.replace("<quantidadeGuias>1<", "<quantidadeGuias>2<");
        let result = codec().validate_structure(&xml);
        assert!(result.is_valid);
        assert!(result.warnings.iter().any(|w| w.contains("declares 2")));
    }

    #[test]
    fn test_guide_fragment() {
        let result = codec().validate_guide("<guiaConsulta><cabecalhoGuia/></guiaConsulta>");
        assert!(result.errors.iter().any(|e| e.contains("dadosBeneficiario")));

        let result = codec().validate_guide("<guiaDesconhecida/>");
        assert!(result.errors[0].contains("unrecognized"));
    }
}
