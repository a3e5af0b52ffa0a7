//! Field catalogue of the registry result page

/// A field and the label texts that introduce it on the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Key used in the extracted record and the registrant table
    pub name: &'static str,

    /// Candidate labels, tried in order; the first one found wins
    pub labels: &'static [&'static str],
}

/// Field holding the masked identifier; it has a pattern fallback
pub const IDENTIFIER_FIELD: &str = "cnpj";

/// Fields extracted from a result page, in extraction order
pub const FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "cnpj", labels: &["CNPJ"] },
    FieldSpec { name: "inscricao_estadual", labels: &["Inscrição Estadual"] },
    FieldSpec { name: "razao_social", labels: &["Nome Empresarial", "Razão Social"] },
    FieldSpec { name: "contribuinte", labels: &["Contribuinte?"] },
    FieldSpec { name: "nome_fantasia", labels: &["Nome Fantasia"] },
    FieldSpec { name: "endereco", labels: &["Endereço Estabelecimento", "Endereço"] },
    FieldSpec { name: "atividade_principal", labels: &["Atividade Principal"] },
    FieldSpec { name: "unidade_auxiliar", labels: &["Unidade Auxiliar"] },
    FieldSpec { name: "condicao_uso", labels: &["Condição de Uso"] },
    FieldSpec { name: "data_final_contrato", labels: &["Data Final de Contrato"] },
    FieldSpec { name: "regime_apuracao", labels: &["Regime de Apuração"] },
    FieldSpec {
        name: "situacao_cadastral",
        labels: &["Situação Cadastral Vigente", "Situação Cadastral"],
    },
    FieldSpec { name: "data_situacao_cadastral", labels: &["Data desta Situação Cadastral"] },
    FieldSpec { name: "data_cadastramento", labels: &["Data de Cadastramento"] },
    FieldSpec { name: "operacoes_nf_e", labels: &["Operações com NF-E"] },
    FieldSpec { name: "observacoes", labels: &["Observações"] },
    FieldSpec { name: "atualizado_em", labels: &["Cadastro Atualizado em"] },
    FieldSpec { name: "data_consulta", labels: &["Data da Consulta"] },
];
