//! Textos de los programas de matemáticas del MEB por curso y resolución del
//! curso a partir del valor libre de la columna `sinif`.

/// Cursos soportados, de menor a mayor. El primero es el valor por defecto.
pub const SUPPORTED_GRADES: [u32; 4] = [9, 10, 11, 12];

const GRADE_9: &str = r#"
MEB 9. Sınıf Matematik Öğretim Programı

1. Sayılar ve Cebir:
   - Sayı Kümeleri: Gerçek sayılar, tam sayılar, kesirli sayılar.
   - Üslü İfadeler: Üslü sayıların özellikleri, hesaplama yöntemleri.
   - Köklü İfadeler: Köklü ifadelerin özellikleri, sadeleştirme işlemleri.
   - Çarpanlara Ayırma: Polinomların çarpanlara ayrılması, sadeleştirme.
   - Denklemler ve Eşitsizlikler: Birinci dereceden denklemler ve eşitsizlikler.

2. Geometri ve Ölçme:
   - Temel Geometrik Kavramlar: Nokta, doğru, düzlem.
   - Doğrular ve Açılar: Paralel/dik doğrular, açı ölçümleri.
   - Üçgenler: Üçgen çeşitleri, açı-kenar ilişkileri, alan hesaplamaları.
   - Dörtgenler ve Çember: Dörtgenlerin özellikleri, çember ve yay kavramları.

3. Veri, Sayma ve Olasılık:
   - Veri Analizi: Veri toplama, düzenleme, yorumlama.
   - Olasılık: Temel olasılık kavramları ve basit olaylar.
"#;

const GRADE_10: &str = r#"
MEB 10. Sınıf Matematik Öğretim Programı

1. Sayılar ve Cebir:
   - Rasyonel Sayılar: Kesir ve ondalık sayılar.
   - Polinomlar: Polinom kavramı, dereceler, temel işlemler.
   - Üslü ve Köklü İfadeler: İleri üslü ve köklü ifadeler.
   - Denklemler ve Eşitsizlikler: İkinci dereceden denklemler, mutlak değer denklemleri.

2. Fonksiyonlar:
   - Fonksiyon Kavramı: Tanım, grafik çizimi, fonksiyon türleri.
   - Lineer, Kuadratik ve Rasyonel Fonksiyonlar: Özellikler ve analizler.

3. Geometri:
   - Analitik Geometri: Nokta, doğru, düzlem denklemleri.
   - Üçgen, Dörtgen ve Çember: Geometrik özellikler ve hesaplamalar.

4. İstatistik ve Olasılık:
   - Veri Analizi: İstatistiksel yöntemler, grafikler.
   - Olasılık: Karmaşık olayların olasılık hesaplamaları.
"#;

const GRADE_11: &str = r#"
MEB 11. Sınıf Matematik Öğretim Programı

1. Fonksiyonlar ve Cebir:
   - Fonksiyonlar: Tanım, çeşitleri, birleşim ve ters fonksiyon.
   - Polinomlar: Polinom bölme, katsayılar ve kök analizi.
   - Rasyonel Fonksiyonlar: Asimptotlar, tanım kümesi.

2. Trigonometri:
   - Temel Trigonometri: Açılar ve trigonometrik oranlar.
   - İleri Trigonometri: Denklemler, kimlikler ve dönüşümler.

3. Analitik Geometri:
   - Doğrular ve Düzlemler: Analitik yöntemler, kesişim noktaları.
   - Konikler: Parabol, elips, hiperbol ve daire.
   - Vektörler: Vektör işlemleri, doğrultu ve norm kavramları.

4. İstatistik ve Olasılık:
   - İstatistik: Dağılımlar, ortalama, varyans.
   - Olasılık: Rastgele olaylar, kombinatorik analiz.
"#;

const GRADE_12: &str = r#"
MEB 12. Sınıf Matematik Öğretim Programı

1. İnceleme ve Analiz:
   - Limit ve Süreklilik: Limit kavramı, süreklilik ve limit hesaplamaları.
   - Türev: Türev tanımı, kurallar ve uygulamalar.
   - İntegral: Belirli ve belirsiz integraller, alan hesaplamaları.
   - Diferansiyel Denklemler: Temel kavramlar ve çözüm yöntemleri.

2. İleri Fonksiyonlar ve Cebir:
   - Matris ve Determinant: Matris işlemleri, determinant hesaplamaları.
   - İleri Polinomlar: Polinom fonksiyonlar ve kök analizi.
   - Logaritmik ve Üstel Fonksiyonlar: İleri düzey hesaplamalar.

3. Geometri ve Analitik Geometri:
   - Uzay Geometrisi: Uzayda nokta, doğru, düzlem ilişkileri.
   - Dönüşümler ve Vektörler: Koordinat dönüşümleri, vektör uzayları.

4. Olasılık ve İstatistik:
   - İleri Olasılık: Olaylar, koşullu olasılık, dağılımlar.
   - İstatistiksel Yöntemler: Veri analizi, regresyon, hipotez testleri.
"#;

/// Curso efectivo para un valor libre como "10. sınıf", "11" o "9".
///
/// Se toma la primera secuencia de dígitos; si no hay ninguna o el curso no está
/// soportado se usa el curso más bajo.
pub fn resolve_grade(grade: &str) -> u32 {
    let digits: String = grade
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    digits
        .parse::<u32>()
        .ok()
        .filter(|g| SUPPORTED_GRADES.contains(g))
        .unwrap_or(SUPPORTED_GRADES[0])
}

/// Texto del programa (sin espacios al principio ni al final) para el curso indicado.
pub fn curriculum_for(grade: &str) -> &'static str {
    let text = match resolve_grade(grade) {
        10 => GRADE_10,
        11 => GRADE_11,
        12 => GRADE_12,
        _ => GRADE_9,
    };
    text.trim()
}
