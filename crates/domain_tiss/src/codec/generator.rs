//! Batch XML rendering

use std::io::Cursor;

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use core_kernel::Money;

use super::{TissCodec, ROOT_ELEMENT, TISS_NAMESPACE};
use crate::batch::ClaimBatch;
use crate::error::TissError;
use crate::guide::{ClaimGuide, GuideType};
use crate::ports::{ClinicInfo, OperatorInfo};
use crate::procedure::ClaimProcedure;

const TRANSACTION_TYPE: &str = "ENVIO_LOTE_GUIAS";

/// A rendered batch, ready to be stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TissXmlDocument {
    /// `TISS_{batchNumber}_{yyyyMMddHHmmss}.xml`
    pub file_name: String,
    pub content: String,
    pub guide_count: usize,
    pub total_amount: Money,
}

impl TissXmlDocument {
    pub fn as_bytes(&self) -> &[u8] {
        self.content.as_bytes()
    }
}

impl TissCodec {
    /// Renders `batch` stamped with the current time
    pub fn generate(
        &self,
        batch: &ClaimBatch,
        clinic: &ClinicInfo,
        operator: &OperatorInfo,
    ) -> Result<TissXmlDocument, TissError> {
        self.generate_at(batch, clinic, operator, Utc::now())
    }

    /// Renders `batch` stamped with `at`; output is identical for identical input
    pub fn generate_at(
        &self,
        batch: &ClaimBatch,
        clinic: &ClinicInfo,
        operator: &OperatorInfo,
        at: DateTime<Utc>,
    ) -> Result<TissXmlDocument, TissError> {
        if batch.guides().is_empty() {
            return Err(TissError::validation(format!(
                "Batch {} must contain at least one guide",
                batch.batch_number
            )));
        }

        let content = self.render(batch, clinic, operator, at).map_err(|e| {
            error!(batch_id = %batch.id, error = %e, "Failed to render TISS XML");
            e
        })?;
        let local = self.config.timezone.to_local(at);
        let file_name = format!(
            "TISS_{}_{}.xml",
            batch.batch_number,
            local.format("%Y%m%d%H%M%S")
        );
        debug!(batch_id = %batch.id, file = %file_name, guides = batch.guides().len(), "TISS XML rendered");

        Ok(TissXmlDocument {
            file_name,
            content,
            guide_count: batch.guides().len(),
            total_amount: batch.total_amount(),
        })
    }

    fn render(
        &self,
        batch: &ClaimBatch,
        clinic: &ClinicInfo,
        operator: &OperatorInfo,
        at: DateTime<Utc>,
    ) -> Result<String, TissError> {
        let local = self.config.timezone.to_local(at);
        let mut xml = XmlBuilder::new();

        xml.declaration()?;
        xml.open_with_attr(ROOT_ELEMENT, ("xmlns", TISS_NAMESPACE))?;

        xml.open("cabecalho")?;
        xml.open("identificacaoTransacao")?;
        xml.leaf("tipoTransacao", TRANSACTION_TYPE)?;
        xml.leaf("sequencialTransacao", &batch.batch_number)?;
        xml.leaf("dataRegistroTransacao", &local.format("%Y-%m-%d").to_string())?;
        xml.leaf("horaRegistroTransacao", &local.format("%H:%M:%S").to_string())?;
        xml.leaf("identificadorTransacao", &batch.id.to_string())?;
        xml.close("identificacaoTransacao")?;
        xml.open("origem")?;
        xml.open("identificacaoPrestador")?;
        xml.leaf("codigoPrestadorNaOperadora", &clinic.provider_code)?;
        xml.close("identificacaoPrestador")?;
        xml.close("origem")?;
        xml.open("destino")?;
        xml.leaf("registroANS", &operator.ans_registration_number)?;
        xml.close("destino")?;
        xml.leaf("versaoPadrao", &self.config.standard_version)?;
        xml.close("cabecalho")?;

        xml.open("guias")?;
        for guide in batch.guides() {
            write_guide(&mut xml, guide, operator)?;
        }
        xml.close("guias")?;

        xml.open("rodape")?;
        xml.leaf("quantidadeGuias", &batch.guides().len().to_string())?;
        xml.leaf("valorTotal", &batch.total_amount().to_wire())?;
        xml.close("rodape")?;

        xml.close(ROOT_ELEMENT)?;
        xml.finish()
    }
}

fn write_guide(xml: &mut XmlBuilder, guide: &ClaimGuide, operator: &OperatorInfo) -> Result<(), TissError> {
    let element = guide.guide_type.element_name();
    xml.open(element)?;

    xml.open("cabecalhoGuia")?;
    xml.leaf("registroANS", &operator.ans_registration_number)?;
    xml.leaf("numeroGuiaPrestador", &guide.guide_number)?;
    if let Some(number) = &guide.operator_guide_number {
        xml.leaf("numeroGuiaOperadora", number)?;
    }
    if let Some(number) = &guide.authorization_number {
        xml.leaf("numeroAutorizacao", number)?;
    }
    xml.close("cabecalhoGuia")?;

    xml.open("dadosBeneficiario")?;
    xml.leaf("numeroCarteira", &guide.beneficiary.card_number)?;
    xml.leaf("nomeBeneficiario", &guide.beneficiary.name)?;
    xml.close("dadosBeneficiario")?;

    let sections = guide.guide_type.variant_sections();
    let lists_procedures = sections.contains(&"procedimentosExecutados");
    for section in sections {
        xml.open(section)?;
        if *section == "procedimentosExecutados" {
            for procedure in guide.procedures() {
                write_procedure(xml, "procedimentoExecutado", procedure)?;
            }
        } else {
            write_service_data(xml, guide)?;
            // Consultations carry their procedures inside the service data
            if !lists_procedures {
                for procedure in guide.procedures() {
                    write_procedure(xml, "procedimento", procedure)?;
                }
            }
        }
        xml.close(section)?;
    }

    xml.leaf("valorTotalGuia", &guide.total_amount().to_wire())?;
    xml.close(element)
}

fn write_service_data(xml: &mut XmlBuilder, guide: &ClaimGuide) -> Result<(), TissError> {
    let date_element = match guide.guide_type {
        GuideType::Consultation => "dataAtendimento",
        GuideType::SpSadt | GuideType::Exam => "dataSolicitacao",
        GuideType::Hospitalization => "dataInicioFaturamento",
        GuideType::Fees => "dataExecucao",
    };
    xml.leaf(date_element, &guide.service_date.format("%Y-%m-%d").to_string())?;
    xml.leaf("tipoAtendimento", guide.guide_type.service_type_code())
}

fn write_procedure(xml: &mut XmlBuilder, element: &str, procedure: &ClaimProcedure) -> Result<(), TissError> {
    xml.open(element)?;
    xml.leaf("codigoProcedimento", &procedure.code)?;
    xml.leaf("descricaoProcedimento", &procedure.description)?;
    xml.leaf("quantidadeExecutada", &procedure.quantity.to_string())?;
    xml.leaf("valorUnitario", &procedure.unit_price.to_wire())?;
    xml.leaf("valorTotal", &procedure.total_price().to_wire())?;
    xml.close(element)
}

/// Thin event writer with two-space indentation
struct XmlBuilder {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlBuilder {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2),
        }
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), TissError> {
        self.writer
            .write_event(event)
            .map_err(|e| TissError::codec(format!("cannot write XML event: {}", e)))
    }

    fn declaration(&mut self) -> Result<(), TissError> {
        self.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    fn open(&mut self, name: &str) -> Result<(), TissError> {
        self.write(Event::Start(BytesStart::new(name)))
    }

    fn open_with_attr(&mut self, name: &str, attr: (&str, &str)) -> Result<(), TissError> {
        let mut start = BytesStart::new(name);
        start.push_attribute(attr);
        self.write(Event::Start(start))
    }

    fn close(&mut self, name: &str) -> Result<(), TissError> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    fn leaf(&mut self, name: &str, text: &str) -> Result<(), TissError> {
        self.open(name)?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    fn finish(self) -> Result<String, TissError> {
        let bytes = self.writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(|e| TissError::codec(format!("rendered XML is not UTF-8: {}", e)))
    }
}
