//! Report content as a flat list of blocks, independent of the PDF backend.

use crate::config::ReportConfig;
use crate::models::Vistoria;

pub const TITLE_SIZES: [f32; 3] = [16.0, 12.0, 14.0];
pub const HEADING_SIZE: f32 = 12.0;
pub const TEXT_SIZE: f32 = 10.0;
pub const CAPTION_SIZE: f32 = 9.0;

pub const SIGNATURE_LINE: &str = "Assinatura: _______________________________";
pub const PHOTO_ERROR_SUFFIX: &str = " (Erro ao carregar imagem)";

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Centered bold header line
    Title { text: String, size: f32 },
    /// Numbered section heading
    Heading(String),
    /// Bold line inside a section
    Label(String),
    Text(String),
    Bullet(String),
    /// Photo at `index` in the photo list, followed by its caption
    Photo { index: usize, caption: String },
    /// Vertical gap in millimetres
    Space(f32),
}

impl Block {
    fn text(value: impl Into<String>) -> Self {
        Block::Text(value.into())
    }
}

/// Caption printed below the i-th photo (1-based)
pub fn photo_caption(number: usize, legenda: &str) -> String {
    format!("Foto {}: {}", number, legenda)
}

fn or_empty(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

/// Lay out a report for `vistoria`; `legendas` are the photo captions in display order
pub fn build(header: &ReportConfig, vistoria: &Vistoria, legendas: &[String]) -> Vec<Block> {
    let mut blocks = Vec::new();

    for (text, size) in [&header.prefecture, &header.secretariat, &header.title]
        .into_iter()
        .zip(TITLE_SIZES)
    {
        blocks.push(Block::Title {
            text: text.clone(),
            size,
        });
    }
    blocks.push(Block::Space(7.0));

    blocks.push(Block::Heading("1. IDENTIFICAÇÃO DA OBRA".to_string()));
    blocks.extend([
        Block::text(format!("Nome da Obra: {}", vistoria.nome_obra)),
        Block::text(format!("Localização: {}", vistoria.localizacao)),
        Block::text(format!(
            "Número do Contrato/Processo: {}",
            or_empty(&vistoria.numero_contrato)
        )),
        Block::text(format!(
            "Empresa Responsável: {}",
            or_empty(&vistoria.empresa_responsavel)
        )),
        Block::text(format!(
            "Engenheiro Responsável: {}",
            or_empty(&vistoria.engenheiro_responsavel)
        )),
        Block::text(format!(
            "Fiscal da Prefeitura: {}",
            or_empty(&vistoria.fiscal_prefeitura)
        )),
        Block::text(format!("Data da Vistoria: {}", vistoria.data_vistoria)),
        Block::text(format!("Hora: {}", vistoria.hora_vistoria)),
    ]);
    if let Some(point) = vistoria.position() {
        blocks.push(Block::text(format!("Coordenadas GPS: {}", point)));
    }
    blocks.push(Block::Space(10.0));

    blocks.push(Block::Heading("2. OBJETIVO DA VISTORIA".to_string()));
    for objetivo in vistoria.objetivos() {
        blocks.push(Block::Bullet(objetivo.label().to_string()));
    }
    if let Some(outros) = vistoria.objetivo_outros.as_deref().filter(|o| !o.is_empty()) {
        blocks.push(Block::Bullet(format!("Outros: {}", outros)));
    }
    blocks.push(Block::Space(10.0));

    blocks.push(Block::Heading(
        "3. DESCRIÇÃO DAS ATIVIDADES VERIFICADAS".to_string(),
    ));
    blocks.push(Block::text(vistoria.descricao_atividades.clone()));
    blocks.push(Block::Space(10.0));

    blocks.push(Block::Heading("4. SITUAÇÃO DA OBRA".to_string()));
    let situacao = vistoria.situacao().map(|s| s.label()).unwrap_or("");
    blocks.push(Block::text(format!("Situação: {}", situacao)));
    if let Some(detalhes) = vistoria.detalhes_pendencias.as_deref().filter(|d| !d.is_empty()) {
        blocks.push(Block::Label("Detalhes das pendências:".to_string()));
        blocks.push(Block::text(detalhes));
    }
    blocks.push(Block::Space(10.0));

    if let Some(recomendacoes) = vistoria.recomendacoes.as_deref().filter(|r| !r.is_empty()) {
        blocks.push(Block::Heading("5. RECOMENDAÇÕES / PROVIDÊNCIAS".to_string()));
        blocks.push(Block::text(recomendacoes));
        blocks.push(Block::Space(10.0));
    }

    if !legendas.is_empty() {
        blocks.push(Block::Heading("6. REGISTRO FOTOGRÁFICO".to_string()));
        for (index, legenda) in legendas.iter().enumerate() {
            blocks.push(Block::Photo {
                index,
                caption: photo_caption(index + 1, legenda),
            });
        }
    }

    blocks.push(Block::Heading("7. ASSINATURAS".to_string()));
    if vistoria.fiscal_nome.is_some() || vistoria.fiscal_matricula.is_some() {
        blocks.extend([
            Block::Label("Fiscal Técnico da Prefeitura:".to_string()),
            Block::text(format!("Nome: {}", or_empty(&vistoria.fiscal_nome))),
            Block::text(format!("Matrícula: {}", or_empty(&vistoria.fiscal_matricula))),
            Block::Space(20.0),
            Block::text(SIGNATURE_LINE),
            Block::Space(15.0),
        ]);
    }
    if vistoria.representante_nome.is_some() || vistoria.representante_cargo.is_some() {
        blocks.extend([
            Block::Label("Representante da Empresa Executora:".to_string()),
            Block::text(format!("Nome: {}", or_empty(&vistoria.representante_nome))),
            Block::text(format!("Cargo: {}", or_empty(&vistoria.representante_cargo))),
            Block::Space(20.0),
            Block::text(SIGNATURE_LINE),
        ]);
    }

    blocks
}

/// Greedy word wrap on character count; words longer than a line are split
pub fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        let mut current_len = 0;

        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }

            let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
            if needed > max_chars {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(word.iter());
            current_len += word.len();
        }

        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
pub(crate) fn sample_vistoria() -> Vistoria {
    Vistoria {
        id: "v1".to_string(),
        user_id: Some("u1".to_string()),
        nome_obra: "Creche Municipal".to_string(),
        localizacao: "Rua das Flores, 120".to_string(),
        numero_contrato: Some("CT-042/2024".to_string()),
        empresa_responsavel: Some("Construtora Vale".to_string()),
        engenheiro_responsavel: None,
        fiscal_prefeitura: Some("Pedro Ramos".to_string()),
        data_vistoria: "2024-05-14".to_string(),
        hora_vistoria: "09:30".to_string(),
        latitude: None,
        longitude: None,
        objetivo_atualizacao_cadastral: false,
        objetivo_inicio_obra: false,
        objetivo_vistoria_rotina: true,
        objetivo_medicao: true,
        objetivo_vistoria_tecnica: false,
        objetivo_encerramento: false,
        objetivo_outros: Some("Conferir drenagem".to_string()),
        descricao_atividades: "Concretagem da laje".to_string(),
        situacao_conformidade: false,
        situacao_pendencias: true,
        situacao_irregularidades: false,
        situacao_paralisada: false,
        situacao_finalizada: false,
        detalhes_pendencias: Some("Falta guarda-corpo".to_string()),
        recomendacoes: None,
        fiscal_nome: Some("Pedro Ramos".to_string()),
        fiscal_matricula: None,
        representante_nome: None,
        representante_cargo: None,
        status: Some("finalizado".to_string()),
        created_at: "2024-05-14T12:00:00Z".to_string(),
        updated_at: "2024-05-14T12:00:00Z".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Objetivo, Situacao};

    fn headings(blocks: &[Block]) -> Vec<&str> {
        blocks
            .iter()
            .filter_map(|b| match b {
                Block::Heading(h) => Some(h.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_photo_blocks_follow_input_order() {
        let legendas: Vec<String> = ["Fachada", "Laje", "Escada", "Telhado"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let blocks = build(&ReportConfig::default(), &sample_vistoria(), &legendas);

        let photos: Vec<(usize, String)> = blocks
            .iter()
            .filter_map(|b| match b {
                Block::Photo { index, caption } => Some((*index, caption.clone())),
                _ => None,
            })
            .collect();

        assert_eq!(photos.len(), 4);
        for (i, (index, caption)) in photos.iter().enumerate() {
            assert_eq!(*index, i);
            assert_eq!(caption, &format!("Foto {}: {}", i + 1, legendas[i]));
        }
    }

    #[test]
    fn test_sections_without_optional_parts() {
        let blocks = build(&ReportConfig::default(), &sample_vistoria(), &[]);
        assert_eq!(
            headings(&blocks),
            vec![
                "1. IDENTIFICAÇÃO DA OBRA",
                "2. OBJETIVO DA VISTORIA",
                "3. DESCRIÇÃO DAS ATIVIDADES VERIFICADAS",
                "4. SITUAÇÃO DA OBRA",
                "7. ASSINATURAS",
            ]
        );

        assert!(blocks.contains(&Block::Label("Fiscal Técnico da Prefeitura:".to_string())));
        assert!(!blocks.contains(&Block::Label(
            "Representante da Empresa Executora:".to_string()
        )));
    }

    #[test]
    fn test_objectives_and_situation_text() {
        let mut vistoria = sample_vistoria();
        vistoria.recomendacoes = Some("Instalar guarda-corpo".to_string());
        let blocks = build(&ReportConfig::default(), &vistoria, &[]);

        assert!(blocks.contains(&Block::Bullet(Objetivo::VistoriaRotina.label().to_string())));
        assert!(blocks.contains(&Block::Bullet(Objetivo::Medicao.label().to_string())));
        assert!(blocks.contains(&Block::Bullet("Outros: Conferir drenagem".to_string())));
        assert!(blocks.contains(&Block::Text(format!(
            "Situação: {}",
            Situacao::ComPendencias.label()
        ))));
        assert!(blocks.contains(&Block::Text("Falta guarda-corpo".to_string())));
        assert!(headings(&blocks).contains(&"5. RECOMENDAÇÕES / PROVIDÊNCIAS"));
    }

    #[test]
    fn test_header_lines_come_from_config() {
        let header = ReportConfig {
            prefecture: "PREFEITURA DE TESTE".to_string(),
            ..ReportConfig::default()
        };
        let blocks = build(&header, &sample_vistoria(), &[]);
        assert_eq!(
            blocks[0],
            Block::Title {
                text: "PREFEITURA DE TESTE".to_string(),
                size: 16.0
            }
        );
    }

    #[test]
    fn test_wrap() {
        assert_eq!(wrap("a bb ccc dddd", 6), vec!["a bb", "ccc", "dddd"]);
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap("", 10), vec![""]);
        assert_eq!(wrap("linha um\nlinha dois", 20), vec!["linha um", "linha dois"]);
    }
}
