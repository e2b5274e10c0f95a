//! Common regex patterns for Argentine invoice extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // CUIT patterns (Argentine tax ID, 11 digits: 2-8-1)
    pub static ref CUIT_PATTERN: Regex = Regex::new(
        r"(?i)(?:CUIT|C\.U\.I\.T\.?)[\s:N°º.]*(\d{2})[-\s.]?(\d{8})[-\s.]?(\d)\b"
    ).unwrap();

    pub static ref CUIT_STANDALONE: Regex = Regex::new(
        r"\b(\d{2})-(\d{8})-(\d)\b"
    ).unwrap();

    // Date patterns
    pub static ref DATE_DMY: Regex = Regex::new(
        r"\b(\d{1,2})[./\-](\d{1,2})[./\-](\d{4}|\d{2})\b"
    ).unwrap();

    pub static ref DATE_YMD: Regex = Regex::new(
        r"\b(\d{4})[./\-](\d{1,2})[./\-](\d{1,2})\b"
    ).unwrap();

    pub static ref DATE_VERBOSE: Regex = Regex::new(
        r"(?i)\b(\d{1,2})\s+de\s+(\p{L}+)(?:\s+de(?:l)?)?\s+(\d{4})\b"
    ).unwrap();

    // Amount tokens: digits with optional `.`/`,` grouping
    pub static ref AMOUNT_TOKEN: Regex = Regex::new(
        r"-?\d[\d.,]*\d|-?\d"
    ).unwrap();

    pub static ref CURRENCY_MARK: Regex = Regex::new(
        r"(?i)AR\$|U\$[SD]|\bARS\b|\bUSD\b|\bEUR\b|\bpesos?\b|\$|€"
    ).unwrap();

    pub static ref CURRENCY_USD: Regex = Regex::new(
        r"(?i)\bUSD\b|U\$[SD]|\bd[oó]lares\b"
    ).unwrap();

    pub static ref CURRENCY_EUR: Regex = Regex::new(
        r"(?i)\bEUR\b|€|\beuros?\b"
    ).unwrap();

    // Document type (letter is case-sensitive, the word is not)
    pub static ref TYPE_LETTER_AFTER: Regex = Regex::new(
        r"(?i:FACTURA)\s*([ABC])\b"
    ).unwrap();

    pub static ref TYPE_LETTER_BEFORE: Regex = Regex::new(
        r"\b([ABC])\s+(?i:FACTURA)\b"
    ).unwrap();

    pub static ref DOC_CODE: Regex = Regex::new(
        r"(?i)\bC[OÓ]D(?:IGO)?\.?\s*(?:N[°º]\s*)?(\d{1,3})\b"
    ).unwrap();

    // Numbering
    pub static ref POS_AND_NUMBER: Regex = Regex::new(
        r"(?i)Punto\s+de\s+Venta[:\s]*(\d{1,5})\b[^\n]{0,40}?Comp(?:robante)?\.?\s*(?:N(?:ro|um|°|º)?\.?)?[:\s]*(\d{1,8})\b"
    ).unwrap();

    pub static ref POINT_OF_SALE: Regex = Regex::new(
        r"(?i)(?:Punto\s+de\s+Venta|P\.\s*V(?:ta)?\.?|PtoVta)[:\s]*(\d{1,5})\b"
    ).unwrap();

    pub static ref INVOICE_NUMBER: Regex = Regex::new(
        r"(?i)Comp(?:robante)?\.?\s*N(?:ro|um|°|º)\.?[:\s]*(?:(\d{4,5})-)?(\d{1,8})\b"
    ).unwrap();

    pub static ref COMPOSITE_NUMBER: Regex = Regex::new(
        r"\b(\d{4,5})-(\d{8})\b"
    ).unwrap();

    // Labeled amounts
    pub static ref NET_AMOUNT: Regex = Regex::new(
        r"(?i)(?:Importe\s+Neto\s+Gravado|Neto\s+Gravado|Importe\s+Neto|Subtotal|Neto)[:\s]*(?:\$|ARS)?\s*(\d[\d.,]*\d|\d)"
    ).unwrap();

    pub static ref TAX_LINE: Regex = Regex::new(
        r"(?i)\bIVA\s*(\d{1,2}(?:[.,]\d{1,2})?)\s*%[:\s]*(?:\$|ARS)?\s*(\d[\d.,]*\d|\d)"
    ).unwrap();

    // Labeled dates
    pub static ref SERVICE_PERIOD: Regex = Regex::new(
        r"(?i)Per[ií]odo\s+Facturado\s+Desde[:\s]*(\d{1,2}[./\-]\d{1,2}[./\-]\d{2,4})\s*Hasta[:\s]*(\d{1,2}[./\-]\d{1,2}[./\-]\d{2,4})"
    ).unwrap();

    pub static ref PAYMENT_DUE: Regex = Regex::new(
        r"(?i)Fecha\s+de\s+V(?:to|encimiento)\.?\s+para\s+el\s+pago[:\s]*(\d{1,2}[./\-]\d{1,2}[./\-]\d{2,4})"
    ).unwrap();

    // Authorization code (CAE) and its expiry
    pub static ref CAE_NUMBER: Regex = Regex::new(
        r"(?i)\bC\.?A\.?E\.?\s*(?:N(?:ro|°|º)?\.?)?[:\s]*(\d{14})\b"
    ).unwrap();

    pub static ref CAE_DUE: Regex = Regex::new(
        r"(?i)V(?:to|encimiento)\.?\s+(?:de(?:l)?\s+)?C\.?A\.?E\.?[:\s]*(\d{1,2}[./\-]\d{1,2}[./\-]\d{2,4})"
    ).unwrap();

    // Other fields
    pub static ref PAYMENT_TERMS: Regex = Regex::new(
        r"(?i)Condici[oó]n\s+de\s+venta[:\s]*([^\n]+)"
    ).unwrap();

    pub static ref CBU: Regex = Regex::new(
        r"(?i)\bCBU[:\s]*(\d{22})\b"
    ).unwrap();

    pub static ref BANK_NAME: Regex = Regex::new(
        r"(?i)\bBanco[:\s]+([^\n]+)"
    ).unwrap();

    pub static ref BRANCH: Regex = Regex::new(
        r"(?i)\bSucursal[:\s]+([^\n]+)"
    ).unwrap();

    // AFIP verification QR
    pub static ref AFIP_QR: Regex = Regex::new(
        r"(?i)https?://(?:www\.)?(?:serviciosweb\.)?afip\.gob\.ar/fe/qr/?\?p=([A-Za-z0-9_\-+/=%]+)"
    ).unwrap();

    // Business names
    pub static ref LEGAL_SUFFIX: Regex = Regex::new(
        r"(?i)(?:^|[^\p{L}])(?:S\.?\s?A\.?\s?U\.?|S\.?\s?A\.?|S\.?\s?R\.?\s?L\.?|S\.?\s?A\.?\s?S\.?|S\.?\s?C\.?\s?A\.?|S\.?\s?H\.?|LTDA\.?|INC\.?|LLC|CORP\.?|COOP(?:ERATIVA)?\.?)(?:$|[^\p{L}])"
    ).unwrap();

    pub static ref UPPERCASE_RUN: Regex = Regex::new(
        r"\p{Lu}{3,}"
    ).unwrap();

    pub static ref NAME_LABEL_PREFIX: Regex = Regex::new(
        r"(?i)^\s*(?:Raz[oó]n\s+Social|Denominaci[oó]n|Apellido\s+y\s+Nombre|Emisor|Proveedor|Receptor|Cliente|Se[ñn]or(?:es|\(es\)|/es)?|Sr\.?(?:es)?)\s*[:\-]?\s*"
    ).unwrap();

    pub static ref NAME_STOPLIST: Regex = Regex::new(
        r"(?i)(?:^|[^\p{L}])(?:cuit|c\.u\.i\.t|iva|domicilio|direcci[oó]n|condici[oó]n|ingresos\s+brutos|iibb|responsable|monotributo|monotributista|exento|consumidor\s+final|punto\s+de\s+venta|comprobante|comp\.|tipo|factura|fecha|cae|tel[eé]fono|tel\.|e-?mail|inicio\s+de\s+actividades|original|duplicado|triplicado|p[aá]gina|total|subtotal|importe|cod\.)(?:$|[^\p{L}])"
    ).unwrap();
}
